//! Chart layout: options, price/index projection, the backend-neutral scene
//! and the renderer contract.

pub mod options;
pub mod projection;
pub mod renderer;
pub mod scene;

pub use options::{ChartOptions, DrawArea, Margin, RenderOptions};
pub use projection::{PRICE_PADDING, Projection, visible_subset};
pub use renderer::{ChartRenderer, DisplayListRenderer, Surface};
pub use scene::{CandleShape, GridLine, Label, PriceMarker, Scene};
