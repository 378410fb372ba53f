use anyhow::{Context, Result};
use ndarray::{ArrayView3, Ix3};
use opencv::core::Mat;
use opencv::prelude::*;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::config::ModelVariant;

use super::estimator::{InferenceParams, MultiPoseParams, PoseEstimator};
use super::keypoint::{Keypoint, KeypointIndex, Pose};
use super::preprocess::frame_to_tensor;

/// マルチポーズモデルのONNXファイル名
const MULTIPOSE_MODEL_FILE: &str = "movenet_multipose.onnx";

/// マルチポーズモデルが一度に返す最大人数
const MULTIPOSE_INSTANCES: usize = 6;

/// MoveNet ベースの姿勢推定エンジン
///
/// シングルポーズ用セッションはバリアントごとに異なるモデルを読む。
/// バリアント交換時はインスタンスごと破棄して作り直す。
pub struct MoveNet {
    single: Session,
    multi: Session,
    variant: ModelVariant,
}

impl MoveNet {
    /// model_dir からバリアントに対応するONNXモデルを読み込む
    pub fn load(model_dir: &Path, variant: ModelVariant) -> Result<Self> {
        let single = load_session(&model_dir.join(variant.model_file()))?;
        let multi = load_session(&model_dir.join(MULTIPOSE_MODEL_FILE))?;
        Ok(Self {
            single,
            multi,
            variant,
        })
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }
}

fn load_session(path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load ONNX model {}", path.display()))
}

/// 出力ストライドからマルチポーズモデルの入力解像度を決める
///
/// ストライドが小さいほど大きな入力（高精度・低速）。
fn multipose_input_size(output_stride: u32) -> i32 {
    match output_stride {
        8 => 384,
        32 => 160,
        _ => 256,
    }
}

impl PoseEstimator for MoveNet {
    fn estimate_single(&mut self, frame: &Mat, params: &InferenceParams) -> Result<Pose> {
        let input = frame_to_tensor(frame, self.variant.input_size(), params)?;
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .single
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Single pose inference failed")?;

        // 出力は [1, 1, 17, 3] (y, x, confidence)
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract single pose output")?;

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for i in 0..KeypointIndex::COUNT {
            let y = output[[0, 0, i, 0]];
            let x = output[[0, 0, i, 1]];
            let confidence = output[[0, 0, i, 2]];
            keypoints[i] = Keypoint::new(x, y, confidence);
        }

        // ポーズスコアはキーポイント信頼度の平均
        let score =
            keypoints.iter().map(|k| k.confidence).sum::<f32>() / KeypointIndex::COUNT as f32;
        Ok(Pose::new(score, keypoints))
    }

    fn estimate_multiple(
        &mut self,
        frame: &Mat,
        params: &InferenceParams,
        multi: &MultiPoseParams,
    ) -> Result<Vec<Pose>> {
        let input_size = multipose_input_size(params.output_stride);
        let input = frame_to_tensor(frame, input_size, params)?;
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .multi
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Multi pose inference failed")?;

        // 出力は [1, 6, 56]: 17*3 キーポイント + bbox(4) + スコア
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract multi pose output")?;
        let output = output
            .into_dimensionality::<Ix3>()
            .context("Unexpected multi pose output shape")?;

        let candidates = decode_multipose(output);
        Ok(suppress_poses(
            candidates,
            frame.cols() as f32,
            frame.rows() as f32,
            multi,
        ))
    }
}

/// マルチポーズ出力テンソルをポーズ候補に変換
///
/// スコア0のパディング行は落とす。NMSと件数制限は suppress_poses が行う。
fn decode_multipose(output: ArrayView3<f32>) -> Vec<Pose> {
    let instances = output.shape()[1].min(MULTIPOSE_INSTANCES);
    let mut poses = Vec::with_capacity(instances);

    for i in 0..instances {
        let score = output[[0, i, 55]];
        if score <= 0.0 {
            continue;
        }

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for j in 0..KeypointIndex::COUNT {
            let y = output[[0, i, j * 3]];
            let x = output[[0, i, j * 3 + 1]];
            let confidence = output[[0, i, j * 3 + 2]];
            keypoints[j] = Keypoint::new(x, y, confidence);
        }

        poses.push(Pose::new(score, keypoints));
    }

    poses
}

/// 重複検出の抑制と件数制限
///
/// スコア降順に走査し、採用済みポーズの中心から nms_radius
/// （ピクセル）以内の候補を捨てる。採用数は max_detections まで。
fn suppress_poses(
    mut candidates: Vec<Pose>,
    frame_w: f32,
    frame_h: f32,
    multi: &MultiPoseParams,
) -> Vec<Pose> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Pose> = Vec::new();
    let mut centers: Vec<(f32, f32)> = Vec::new();

    for pose in candidates {
        if kept.len() >= multi.max_detections {
            break;
        }

        let center = pose_center(&pose, multi.min_part_confidence);
        let suppressed = multi.nms_radius > 0.0
            && centers.iter().any(|&(cx, cy)| {
                let dx = (center.0 - cx) * frame_w;
                let dy = (center.1 - cy) * frame_h;
                (dx * dx + dy * dy).sqrt() < multi.nms_radius
            });

        if !suppressed {
            centers.push(center);
            kept.push(pose);
        }
    }

    kept
}

/// ポーズの代表点（正規化座標）
///
/// パーツ閾値を超えるキーポイントの重心。どれも超えない場合は全点の重心。
fn pose_center(pose: &Pose, min_part_confidence: f32) -> (f32, f32) {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0u32;

    for kp in &pose.keypoints {
        if kp.is_valid(min_part_confidence) {
            sum_x += kp.x;
            sum_y += kp.y;
            count += 1;
        }
    }

    if count == 0 {
        for kp in &pose.keypoints {
            sum_x += kp.x;
            sum_y += kp.y;
        }
        count = KeypointIndex::COUNT as u32;
    }

    (sum_x / count as f32, sum_y / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn multipose_output(instances: &[(f32, f32, f32)]) -> Array3<f32> {
        // (score, cx, cy) から [1, 6, 56] の出力を合成する
        let mut output = Array3::<f32>::zeros((1, MULTIPOSE_INSTANCES, 56));
        for (i, &(score, cx, cy)) in instances.iter().enumerate() {
            for j in 0..KeypointIndex::COUNT {
                output[[0, i, j * 3]] = cy;
                output[[0, i, j * 3 + 1]] = cx;
                output[[0, i, j * 3 + 2]] = 0.9;
            }
            output[[0, i, 55]] = score;
        }
        output
    }

    fn pose_at(score: f32, cx: f32, cy: f32) -> Pose {
        let keypoints = [Keypoint::new(cx, cy, 0.9); KeypointIndex::COUNT];
        Pose::new(score, keypoints)
    }

    fn params(max_detections: usize, nms_radius: f32) -> MultiPoseParams {
        MultiPoseParams {
            max_detections,
            min_part_confidence: 0.1,
            nms_radius,
        }
    }

    #[test]
    fn test_decode_skips_zero_score_padding() {
        let output = multipose_output(&[(0.8, 0.5, 0.5), (0.0, 0.0, 0.0)]);
        let poses = decode_multipose(output.view());
        assert_eq!(poses.len(), 1);
        assert!((poses[0].score - 0.8).abs() < 1e-6);
        let nose = poses[0].get(KeypointIndex::Nose);
        assert!((nose.x - 0.5).abs() < 1e-6);
        assert!((nose.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_suppress_respects_max_detections() {
        let candidates = vec![
            pose_at(0.9, 0.1, 0.1),
            pose_at(0.8, 0.5, 0.5),
            pose_at(0.7, 0.9, 0.9),
        ];
        let kept = suppress_poses(candidates, 600.0, 500.0, &params(2, 30.0));
        assert_eq!(kept.len(), 2);
        // スコア降順で残る
        assert!((kept[0].score - 0.9).abs() < 1e-6);
        assert!((kept[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_suppress_drops_nearby_duplicate() {
        // 中心間の距離は約 7.8px < 30px なので低スコア側が消える
        let candidates = vec![pose_at(0.9, 0.50, 0.50), pose_at(0.6, 0.51, 0.51)];
        let kept = suppress_poses(candidates, 600.0, 500.0, &params(5, 30.0));
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_suppress_keeps_distant_poses() {
        let candidates = vec![pose_at(0.9, 0.2, 0.2), pose_at(0.6, 0.8, 0.8)];
        let kept = suppress_poses(candidates, 600.0, 500.0, &params(5, 30.0));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_zero_radius_disables_suppression() {
        let candidates = vec![pose_at(0.9, 0.50, 0.50), pose_at(0.6, 0.50, 0.50)];
        let kept = suppress_poses(candidates, 600.0, 500.0, &params(5, 0.0));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_multipose_input_size_tracks_stride() {
        assert!(multipose_input_size(8) > multipose_input_size(16));
        assert!(multipose_input_size(16) > multipose_input_size(32));
    }

    #[test]
    fn test_pose_center_ignores_low_confidence_parts() {
        let mut keypoints = [Keypoint::new(0.5, 0.5, 0.9); KeypointIndex::COUNT];
        keypoints[0] = Keypoint::new(0.0, 0.0, 0.01);
        let pose = Pose::new(0.9, keypoints);
        let (cx, cy) = pose_center(&pose, 0.1);
        assert!((cx - 0.5).abs() < 1e-6);
        assert!((cy - 0.5).abs() < 1e-6);
    }
}
