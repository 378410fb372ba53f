use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};

use super::FrameSource;

/// 動画ファイルをフレームソースとして扱う
///
/// 終端に達したら先頭に巻き戻してループ再生する。
pub struct VideoFileSource {
    capture: VideoCapture,
    path: String,
}

impl VideoFileSource {
    pub fn open(path: &str) -> Result<Self> {
        let capture = VideoCapture::from_file(path, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("Failed to open video file {path}"))?;

        if !capture.is_opened()? {
            anyhow::bail!("Video file {} could not be opened", path);
        }

        Ok(Self {
            capture,
            path: path.to_string(),
        })
    }

    fn read_next(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let ok = self.capture.read(&mut frame)?;
        if !ok || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

impl FrameSource for VideoFileSource {
    fn current_frame(&mut self) -> Result<Mat> {
        if let Some(frame) = self.read_next()? {
            return Ok(frame);
        }

        // 終端: 巻き戻して読み直す
        self.capture.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
        match self.read_next()? {
            Some(frame) => Ok(frame),
            None => anyhow::bail!("No frames readable from video file {}", self.path),
        }
    }
}
