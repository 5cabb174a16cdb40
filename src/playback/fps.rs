//! Rolling one-second frame counter.

const WINDOW_MS: f64 = 1000.0;

/// Counts ticks and publishes the count once per wall-clock second.
#[derive(Debug, Clone, Default)]
pub struct FpsMeter {
    frames: u32,
    window_start: Option<f64>,
    fps: u32,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one tick at wall time `now_ms` and returns the published FPS.
    pub fn record(&mut self, now_ms: f64) -> u32 {
        let window_start = *self.window_start.get_or_insert(now_ms);
        self.frames += 1;

        if now_ms - window_start >= WINDOW_MS {
            self.fps = self.frames;
            self.frames = 0;
            self.window_start = Some(now_ms);
        }

        self.fps
    }

    /// Last published value; zero until a full window has elapsed.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
