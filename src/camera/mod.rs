pub mod capture;
pub mod video;

pub use capture::{OpenCvCamera, ThreadedCamera};
pub use video::VideoFileSource;

use anyhow::Result;
use opencv::core::Mat;

/// アクティブな映像ストリームの抽象
///
/// 常に「今ある最新フレーム」を返す。バッファリングはしない。
pub trait FrameSource {
    fn current_frame(&mut self) -> Result<Mat>;
}
