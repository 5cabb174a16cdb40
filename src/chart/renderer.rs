//! Renderer contract and the display-list implementation.

use tracing::debug;

use crate::chart::options::RenderOptions;
use crate::chart::scene::Scene;
use crate::error::ReplayError;
use crate::market::candle::Candle;

// Every back-end (vector paths, raster canvas, GPU pipeline) implements this
// same capability set, so a view can swap one for another without touching
// the playback or data code.
// =============================================================================

/// Uniform lifecycle of a chart back-end.
pub trait ChartRenderer {
    /// Whatever the back-end draws into.
    type Container;

    fn init(&mut self, container: Self::Container) -> Result<(), ReplayError>;

    /// Draws `candles` for the frame described by `options`.
    ///
    /// Candles after `options.current_timestamp` must not appear while
    /// animating, and an empty slice must produce an empty chart, not an error.
    fn render(&mut self, candles: &[Candle], options: &RenderOptions) -> Result<(), ReplayError>;

    fn clear(&mut self) -> Result<(), ReplayError>;

    fn resize(&mut self, width: f64, height: f64) -> Result<(), ReplayError>;

    /// Releases the container. Further calls other than `init` fail.
    fn destroy(&mut self);

    fn name(&self) -> &'static str;
}

/// Drawing target of a [`DisplayListRenderer`]: just a pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f64,
    pub height: f64,
}

impl Surface {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Renderer that keeps the most recent [`Scene`] instead of painting it.
///
/// Useful headless, in tests, and as the front half of a real back-end that
/// walks the scene to issue its own draw calls.
#[derive(Debug, Default)]
pub struct DisplayListRenderer {
    surface: Option<Surface>,
    scene: Option<Scene>,
    frames: u64,
}

impl DisplayListRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last rendered scene, if any.
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn is_initialised(&self) -> bool {
        self.surface.is_some()
    }

    fn surface(&self) -> Result<Surface, ReplayError> {
        self.surface.ok_or_else(|| ReplayError::render("renderer is not initialised"))
    }
}

impl ChartRenderer for DisplayListRenderer {
    type Container = Surface;

    fn init(&mut self, container: Surface) -> Result<(), ReplayError> {
        if !(container.width > 0.0 && container.height > 0.0) {
            return Err(ReplayError::render(format!(
                "surface {}x{} has no area",
                container.width, container.height
            )));
        }
        self.surface = Some(container);
        self.scene = None;
        debug!(
            width = container.width,
            height = container.height,
            "Display list renderer initialised"
        );
        Ok(())
    }

    fn render(&mut self, candles: &[Candle], options: &RenderOptions) -> Result<(), ReplayError> {
        let surface = self.surface()?;
        // the surface, not the caller, decides the pixel size
        let mut options = options.clone();
        options.chart.width = surface.width;
        options.chart.height = surface.height;

        self.scene = Some(Scene::build(candles, &options));
        self.frames += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ReplayError> {
        let surface = self.surface()?;
        self.scene = Some(Scene::empty(surface.width, surface.height));
        Ok(())
    }

    fn resize(&mut self, width: f64, height: f64) -> Result<(), ReplayError> {
        self.surface()?;
        self.surface = Some(Surface::new(width, height));
        debug!(width, height, "Display list renderer resized");
        Ok(())
    }

    fn destroy(&mut self) {
        self.surface = None;
        self.scene = None;
    }

    fn name(&self) -> &'static str {
        "display-list"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::options::ChartOptions;

    fn sample() -> Vec<Candle> {
        vec![
            Candle::new(0, 10.0, 12.0, 9.0, 11.0),
            Candle::new(60_000, 11.0, 13.0, 10.0, 10.5),
        ]
    }

    fn options() -> RenderOptions {
        RenderOptions::new(ChartOptions::default(), 60_000, false)
    }

    #[test]
    fn test_render_requires_init() {
        let mut renderer = DisplayListRenderer::new();
        assert!(renderer.render(&sample(), &options()).is_err());
        assert!(renderer.clear().is_err());
    }

    #[test]
    fn test_render_uses_surface_size() {
        let mut renderer = DisplayListRenderer::new();
        renderer.init(Surface::new(800.0, 400.0)).unwrap();
        renderer.render(&sample(), &options()).unwrap();

        let scene = renderer.scene().unwrap();
        assert_eq!(scene.width, 800.0);
        assert_eq!(scene.candles.len(), 2);
        assert_eq!(renderer.frames_rendered(), 1);

        renderer.resize(640.0, 480.0).unwrap();
        renderer.render(&sample(), &options()).unwrap();
        assert_eq!(renderer.scene().unwrap().height, 480.0);
    }

    #[test]
    fn test_clear_and_destroy() {
        let mut renderer = DisplayListRenderer::new();
        renderer.init(Surface::new(800.0, 400.0)).unwrap();
        renderer.render(&sample(), &options()).unwrap();
        renderer.clear().unwrap();
        assert!(renderer.scene().unwrap().is_empty());

        renderer.destroy();
        assert!(!renderer.is_initialised());
        assert!(renderer.render(&sample(), &options()).is_err());
    }

    #[test]
    fn test_empty_render_is_not_an_error() {
        let mut renderer = DisplayListRenderer::new();
        renderer.init(Surface::new(800.0, 400.0)).unwrap();
        renderer.render(&[], &options()).unwrap();
        assert!(renderer.scene().unwrap().is_empty());
    }

    #[test]
    fn test_init_rejects_zero_surface() {
        let mut renderer = DisplayListRenderer::new();
        assert!(renderer.init(Surface::new(0.0, 100.0)).is_err());
    }
}
