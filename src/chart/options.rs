use serde::{Deserialize, Serialize};

/// Space reserved around the plot for axes and labels, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 20.0,
            right: 50.0,
            bottom: 30.0,
            left: 60.0,
        }
    }
}

/// Plot rectangle inside the margins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawArea {
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Visual settings shared by every renderer back-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartOptions {
    pub width: f64,
    pub height: f64,
    pub margin: Margin,
    pub candle_width: f64,
    pub candle_gap: f64,
    pub up_color: String,
    pub down_color: String,
    pub show_grid: bool,
    pub grid_color: String,
    pub show_x_axis: bool,
    pub show_y_axis: bool,
    /// Fade candles younger than one simulated minute while animating.
    pub fade_recent: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 1150.0,
            height: 500.0,
            margin: Margin::default(),
            candle_width: 6.0,
            candle_gap: 2.0,
            up_color: "#26a69a".to_string(),
            down_color: "#ef5350".to_string(),
            show_grid: true,
            grid_color: "rgba(0, 0, 0, 0.1)".to_string(),
            show_x_axis: true,
            show_y_axis: true,
            fade_recent: true,
        }
    }
}

impl ChartOptions {
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Plot area; collapses to zero rather than going negative.
    pub fn draw_area(&self) -> DrawArea {
        DrawArea {
            width: (self.width - self.margin.left - self.margin.right).max(0.0),
            height: (self.height - self.margin.top - self.margin.bottom).max(0.0),
            offset_x: self.margin.left,
            offset_y: self.margin.top,
        }
    }

    /// Horizontal distance between the left edges of two neighbouring candles.
    pub fn candle_pitch(&self) -> f64 {
        self.candle_width + self.candle_gap
    }
}

/// Per-call render parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub chart: ChartOptions,
    /// Simulated timestamp being shown (epoch ms).
    pub current_timestamp: i64,
    pub is_animating: bool,
}

impl RenderOptions {
    pub fn new(chart: ChartOptions, current_timestamp: i64, is_animating: bool) -> Self {
        Self {
            chart,
            current_timestamp,
            is_animating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_area_subtracts_margins() {
        let area = ChartOptions::default().draw_area();
        assert_eq!(area.width, 1040.0);
        assert_eq!(area.height, 450.0);
        assert_eq!(area.offset_x, 60.0);
        assert_eq!(area.offset_y, 20.0);
    }

    #[test]
    fn test_draw_area_never_negative() {
        let area = ChartOptions::default().with_size(10.0, 10.0).draw_area();
        assert_eq!(area.width, 0.0);
        assert_eq!(area.height, 0.0);
    }
}
