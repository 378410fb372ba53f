use anyhow::Result;
use opencv::core::Mat;

use crate::config::{Algorithm, Settings};
use crate::pose::Pose;

use super::canvas::Canvas;
use super::skeleton::{
    BOUNDING_BOX_COLOR, KEYPOINT_COLOR, KEYPOINT_RADIUS, SKELETON_COLOR, SKELETON_CONNECTIONS,
};

/// 1フレーム分の描画パラメータ
#[derive(Debug, Clone, Copy)]
pub struct RenderParams {
    pub min_pose_confidence: f32,
    pub min_part_confidence: f32,
    pub show_skeleton: bool,
    pub show_points: bool,
    pub show_bounding_box: bool,
}

impl RenderParams {
    /// 設定スナップショットから構築。閾値は現在のアルゴリズム側の値を使う。
    pub fn from_settings(settings: &Settings) -> Self {
        let (min_pose_confidence, min_part_confidence) = match settings.algorithm {
            Algorithm::SinglePose => (
                settings.single_pose.min_pose_confidence,
                settings.single_pose.min_part_confidence,
            ),
            Algorithm::MultiPose => (
                settings.multi_pose.min_pose_confidence,
                settings.multi_pose.min_part_confidence,
            ),
        };
        Self {
            min_pose_confidence,
            min_part_confidence,
            show_skeleton: settings.output.show_skeleton,
            show_points: settings.output.show_points,
            show_bounding_box: settings.output.show_bounding_box,
        }
    }
}

/// 1サイクル分の描画
///
/// サーフェスをクリアし、フレーム（show_video時のみ渡される）を
/// ブリットしてからポーズを重ねる。同じ入力なら何度呼んでも
/// 同じ結果になる（前フレームは上書きされる）。
pub fn render(
    canvas: &mut Canvas,
    frame: Option<&Mat>,
    poses: &[Pose],
    params: &RenderParams,
    mirror: bool,
) -> Result<()> {
    canvas.clear();

    if let Some(frame) = frame {
        canvas.draw_frame(frame, mirror)?;
    }

    let w = canvas.width() as u32;
    let h = canvas.height() as u32;

    for pose in poses {
        if pose.score < params.min_pose_confidence {
            continue;
        }

        // 骨格線を先に描き、マーカーを上に重ねる
        if params.show_skeleton {
            for (start_idx, end_idx) in SKELETON_CONNECTIONS.iter() {
                let start = pose.get(*start_idx);
                let end = pose.get(*end_idx);

                if start.is_valid(params.min_part_confidence)
                    && end.is_valid(params.min_part_confidence)
                {
                    let (x1, y1) = start.to_pixel(w, h);
                    let (x2, y2) = end.to_pixel(w, h);
                    canvas.draw_line(x1, y1, x2, y2, SKELETON_COLOR);
                }
            }
        }

        if params.show_points {
            for kp in pose.keypoints.iter() {
                if kp.is_valid(params.min_part_confidence) {
                    let (px, py) = kp.to_pixel(w, h);
                    canvas.draw_circle(px, py, KEYPOINT_RADIUS, KEYPOINT_COLOR);
                }
            }
        }

        if params.show_bounding_box {
            // パーツ閾値とは無関係に全キーポイントを囲む
            let bbox = pose.bounding_box();
            let x0 = (bbox.min_x * w as f32) as i32;
            let y0 = (bbox.min_y * h as f32) as i32;
            let x1 = (bbox.max_x * w as f32) as i32;
            let y1 = (bbox.max_y * h as f32) as i32;
            canvas.draw_rect(x0, y0, x1, y1, BOUNDING_BOX_COLOR);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, KeypointIndex};

    fn canvas() -> Canvas {
        Canvas::new(600, 500)
    }

    fn uniform_pose(score: f32, confidence: f32) -> Pose {
        // 中央付近に散らした17キーポイント
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            let t = i as f32 / (KeypointIndex::COUNT - 1) as f32;
            *kp = Keypoint::new(0.3 + 0.4 * t, 0.3 + 0.4 * t, confidence);
        }
        Pose::new(score, keypoints)
    }

    fn params_all_on() -> RenderParams {
        RenderParams {
            min_pose_confidence: 0.15,
            min_part_confidence: 0.1,
            show_skeleton: true,
            show_points: true,
            show_bounding_box: false,
        }
    }

    fn count_color(canvas: &Canvas, color: u32) -> usize {
        canvas.buffer().iter().filter(|&&p| p == color).count()
    }

    #[test]
    fn test_pose_below_threshold_draws_nothing() {
        let mut canvas = canvas();
        let poses = vec![uniform_pose(0.05, 0.9)];
        render(&mut canvas, None, &poses, &params_all_on(), false).unwrap();
        assert!(canvas.buffer().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_confident_pose_draws_points_and_skeleton_no_box() {
        let mut canvas = canvas();
        let poses = vec![uniform_pose(0.9, 0.9)];
        render(&mut canvas, None, &poses, &params_all_on(), false).unwrap();

        // 全キーポイントのマーカーが置かれる
        for kp in poses[0].keypoints.iter() {
            let (px, py) = kp.to_pixel(600, 500);
            assert_eq!(canvas.pixel(px, py), Some(KEYPOINT_COLOR));
        }
        assert!(count_color(&canvas, SKELETON_COLOR) > 0);
        assert_eq!(count_color(&canvas, BOUNDING_BOX_COLOR), 0);
    }

    #[test]
    fn test_low_confidence_part_excluded_from_points() {
        let mut canvas = canvas();
        let mut pose = uniform_pose(0.9, 0.9);
        // 右手首だけ閾値未満、他から離れた位置に置く
        pose.keypoints[KeypointIndex::RightWrist as usize] = Keypoint::new(0.95, 0.05, 0.01);

        render(&mut canvas, None, &[pose.clone()], &params_all_on(), false).unwrap();

        let (px, py) = pose.get(KeypointIndex::RightWrist).to_pixel(600, 500);
        assert_eq!(canvas.pixel(px, py), Some(0));
    }

    #[test]
    fn test_low_confidence_part_still_extends_bounding_box() {
        let mut canvas = canvas();
        let mut pose = uniform_pose(0.9, 0.9);
        pose.keypoints[KeypointIndex::RightWrist as usize] = Keypoint::new(0.95, 0.05, 0.01);

        let mut params = params_all_on();
        params.show_points = false;
        params.show_skeleton = false;
        params.show_bounding_box = true;

        render(&mut canvas, None, &[pose], &params, false).unwrap();

        // ボックスの右上角は低信頼度キーポイントの位置まで伸びる
        let x1 = (0.95f32 * 600.0) as i32;
        let y0 = (0.05f32 * 500.0) as i32;
        assert_eq!(canvas.pixel(x1, y0), Some(BOUNDING_BOX_COLOR));
    }

    #[test]
    fn test_skeleton_segment_dropped_when_endpoint_below_threshold() {
        let mut canvas = canvas();
        let mut keypoints = [Keypoint::new(0.5, 0.5, 0.0); KeypointIndex::COUNT];
        // 肩-肘だけ有効にし、肘-手首は手首側が閾値未満
        keypoints[KeypointIndex::LeftShoulder as usize] = Keypoint::new(0.2, 0.2, 0.9);
        keypoints[KeypointIndex::LeftElbow as usize] = Keypoint::new(0.4, 0.4, 0.9);
        keypoints[KeypointIndex::LeftWrist as usize] = Keypoint::new(0.6, 0.6, 0.05);
        let pose = Pose::new(0.9, keypoints);

        let mut params = params_all_on();
        params.show_points = false;

        render(&mut canvas, None, &[pose], &params, false).unwrap();

        // 肩-肘の線は中点に届く
        assert_eq!(canvas.pixel(180, 150), Some(SKELETON_COLOR));
        // 肘-手首の線は描かれない（中点は空）
        assert_eq!(canvas.pixel(300, 250), Some(0));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut canvas = canvas();
        let poses = vec![uniform_pose(0.9, 0.9), uniform_pose(0.05, 0.2)];
        let mut params = params_all_on();
        params.show_bounding_box = true;

        render(&mut canvas, None, &poses, &params, false).unwrap();
        let first = canvas.buffer().to_vec();
        render(&mut canvas, None, &poses, &params, false).unwrap();
        assert_eq!(canvas.buffer(), first.as_slice());
    }

    #[test]
    fn test_toggles_suppress_layers() {
        let mut canvas = canvas();
        let poses = vec![uniform_pose(0.9, 0.9)];
        let params = RenderParams {
            min_pose_confidence: 0.15,
            min_part_confidence: 0.1,
            show_skeleton: false,
            show_points: false,
            show_bounding_box: false,
        };
        render(&mut canvas, None, &poses, &params, false).unwrap();
        assert!(canvas.buffer().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_render_params_follow_active_algorithm() {
        let mut settings = Settings::default();
        settings.algorithm = Algorithm::SinglePose;
        let p = RenderParams::from_settings(&settings);
        assert!((p.min_pose_confidence - 0.1).abs() < 1e-6);
        assert!((p.min_part_confidence - 0.5).abs() < 1e-6);

        settings.algorithm = Algorithm::MultiPose;
        let p = RenderParams::from_settings(&settings);
        assert!((p.min_pose_confidence - 0.15).abs() < 1e-6);
        assert!((p.min_part_confidence - 0.1).abs() < 1e-6);
    }
}
