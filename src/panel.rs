//! キーボード設定パネル
//!
//! 各ウィンドウのキー入力で共有設定を書き換える。ループ本体は
//! ここでの変更を次周のスナップショットで観測する。

use minifb::Key;

use crate::config::{Algorithm, SharedSettings};
use crate::render::DisplayWindow;

/// 閾値の増減幅
const THRESHOLD_STEP: f32 = 0.05;

/// スケール係数の増減幅
const SCALE_STEP: f32 = 0.1;

/// 起動時に表示する操作一覧
pub const HELP: &str = "操作: [A] アルゴリズム  [M] モデル  [O] ストライド  [,/.] スケール  \
[V/S/P/B] 映像/骨格/点/ボックス  [Up/Down] ポーズ閾値  [Left/Right] パーツ閾値  \
[-/=] 最大検出数  [Esc] 終了";

/// 1周分のキー入力を設定に反映する
pub fn handle_input(window: &DisplayWindow, settings: &SharedSettings) {
    if window.key_pressed(Key::A) {
        settings.update(|s| {
            s.algorithm = match s.algorithm {
                Algorithm::SinglePose => Algorithm::MultiPose,
                Algorithm::MultiPose => Algorithm::SinglePose,
            };
            println!("algorithm: {:?}", s.algorithm);
        });
    }

    if window.key_pressed(Key::M) {
        settings.update(|s| {
            // 次周のループがモデル交換を検知する
            s.input.model_variant = s.input.model_variant.next();
            println!("model variant: {}", s.input.model_variant.label());
        });
    }

    if window.key_pressed(Key::O) {
        settings.update(|s| {
            s.input.output_stride = match s.input.output_stride {
                8 => 16,
                16 => 32,
                _ => 8,
            };
            println!("output stride: {}", s.input.output_stride);
        });
    }

    if window.key_pressed(Key::Comma) {
        settings.update(|s| {
            s.input.image_scale_factor = (s.input.image_scale_factor - SCALE_STEP).max(0.2);
            println!("image scale factor: {:.1}", s.input.image_scale_factor);
        });
    }
    if window.key_pressed(Key::Period) {
        settings.update(|s| {
            s.input.image_scale_factor = (s.input.image_scale_factor + SCALE_STEP).min(1.0);
            println!("image scale factor: {:.1}", s.input.image_scale_factor);
        });
    }

    if window.key_pressed(Key::V) {
        settings.update(|s| s.output.show_video = !s.output.show_video);
    }
    if window.key_pressed(Key::S) {
        settings.update(|s| s.output.show_skeleton = !s.output.show_skeleton);
    }
    if window.key_pressed(Key::P) {
        settings.update(|s| s.output.show_points = !s.output.show_points);
    }
    if window.key_pressed(Key::B) {
        settings.update(|s| s.output.show_bounding_box = !s.output.show_bounding_box);
    }

    if window.key_pressed(Key::Up) {
        nudge_pose_threshold(settings, THRESHOLD_STEP);
    }
    if window.key_pressed(Key::Down) {
        nudge_pose_threshold(settings, -THRESHOLD_STEP);
    }
    if window.key_pressed(Key::Right) {
        nudge_part_threshold(settings, THRESHOLD_STEP);
    }
    if window.key_pressed(Key::Left) {
        nudge_part_threshold(settings, -THRESHOLD_STEP);
    }

    if window.key_pressed(Key::Equal) {
        settings.update(|s| {
            s.multi_pose.max_detections = (s.multi_pose.max_detections + 1).min(20);
            println!("max detections: {}", s.multi_pose.max_detections);
        });
    }
    if window.key_pressed(Key::Minus) {
        settings.update(|s| {
            s.multi_pose.max_detections = s.multi_pose.max_detections.saturating_sub(1).max(1);
            println!("max detections: {}", s.multi_pose.max_detections);
        });
    }
}

/// 現在のアルゴリズム側のポーズ閾値を増減（パネル上の範囲は 0.0〜1.0）
fn nudge_pose_threshold(settings: &SharedSettings, delta: f32) {
    settings.update(|s| {
        let value = match s.algorithm {
            Algorithm::SinglePose => &mut s.single_pose.min_pose_confidence,
            Algorithm::MultiPose => &mut s.multi_pose.min_pose_confidence,
        };
        *value = (*value + delta).clamp(0.0, 1.0);
        println!("min pose confidence: {:.2}", *value);
    });
}

fn nudge_part_threshold(settings: &SharedSettings, delta: f32) {
    settings.update(|s| {
        let value = match s.algorithm {
            Algorithm::SinglePose => &mut s.single_pose.min_part_confidence,
            Algorithm::MultiPose => &mut s.multi_pose.min_part_confidence,
        };
        *value = (*value + delta).clamp(0.0, 1.0);
        println!("min part confidence: {:.2}", *value);
    });
}
