use anyhow::Result;
use opencv::core::Mat;

use crate::config::Settings;

use super::keypoint::Pose;

/// 両アルゴリズム共通の推論パラメータ
///
/// 毎フレーム、設定スナップショットから構築される。
#[derive(Debug, Clone, Copy)]
pub struct InferenceParams {
    /// 推論前にフレームを縮小する係数 (0.0〜1.0]
    pub image_scale_factor: f32,
    /// フレームを左右反転して推論するか（フロントカメラ用）。
    /// trueのとき、返されるキーポイント座標は反転後の座標系になる。
    pub flip_horizontal: bool,
    /// 出力ストライド: 8 / 16 / 32
    pub output_stride: u32,
}

impl InferenceParams {
    pub fn from_settings(settings: &Settings, flip_horizontal: bool) -> Self {
        Self {
            image_scale_factor: settings.input.image_scale_factor,
            flip_horizontal,
            output_stride: settings.input.output_stride,
        }
    }
}

/// マルチポーズ固有のパラメータ
#[derive(Debug, Clone, Copy)]
pub struct MultiPoseParams {
    pub max_detections: usize,
    pub min_part_confidence: f32,
    /// 検出同士の最小距離（ピクセル）
    pub nms_radius: f32,
}

impl MultiPoseParams {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_detections: settings.multi_pose.max_detections,
            min_part_confidence: settings.multi_pose.min_part_confidence,
            nms_radius: settings.multi_pose.nms_radius,
        }
    }
}

/// 姿勢推定エンジンの呼び出し契約
///
/// エンジン内部（ネットワーク構造やNMSの実装）はこのトレイトの
/// 背後に隠れる。ループと描画は実装を差し替えても変わらない。
pub trait PoseEstimator {
    /// 必ず1ポーズ返す。スコアが極端に低いこともある（呼び出し側が閾値で落とす）。
    fn estimate_single(&mut self, frame: &Mat, params: &InferenceParams) -> Result<Pose>;

    /// 0個以上のポーズを返す。件数は max_detections 以下、
    /// nms_radius による空間的な重複抑制は適用済み。
    fn estimate_multiple(
        &mut self,
        frame: &Mat,
        params: &InferenceParams,
        multi: &MultiPoseParams,
    ) -> Result<Vec<Pose>>;
}
