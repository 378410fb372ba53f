pub mod canvas;
#[cfg(feature = "desktop")]
pub mod overlay;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use canvas::Canvas;
#[cfg(feature = "desktop")]
pub use overlay::{render, RenderParams};
pub use skeleton::SKELETON_CONNECTIONS;
#[cfg(feature = "desktop")]
pub use window::DisplayWindow;

/// 描画サーフェスの固定サイズ（ソースごとに1面）
pub const SURFACE_WIDTH: usize = 600;
pub const SURFACE_HEIGHT: usize = 500;
