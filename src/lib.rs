#[cfg(feature = "desktop")]
pub mod camera;
pub mod config;
#[cfg(feature = "desktop")]
pub mod driver;
#[cfg(feature = "desktop")]
pub mod panel;
pub mod pose;
pub mod render;
