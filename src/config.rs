use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// 姿勢推定アルゴリズム
///
/// SinglePose は高速だがフレーム内に1人だけを想定する。
/// MultiPose は複数人に対応する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    SinglePose,
    MultiPose,
}

/// モデルバリアント（容量/精度のティア）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// 高速・低精度
    Lightning,
    /// 低速・高精度
    Thunder,
}

impl ModelVariant {
    /// シングルポーズ用ONNXファイル名
    pub fn model_file(&self) -> &'static str {
        match self {
            Self::Lightning => "movenet_lightning.onnx",
            Self::Thunder => "movenet_thunder.onnx",
        }
    }

    /// シングルポーズモデルの入力サイズ
    pub fn input_size(&self) -> i32 {
        match self {
            Self::Lightning => 192,
            Self::Thunder => 256,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Lightning => "lightning",
            Self::Thunder => "thunder",
        }
    }

    /// パネルでの巡回切替用
    pub fn next(&self) -> Self {
        match self {
            Self::Lightning => Self::Thunder,
            Self::Thunder => Self::Lightning,
        }
    }
}

/// 入力（推論）パラメータ
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InputSettings {
    #[serde(default = "default_model_variant")]
    pub model_variant: ModelVariant,
    /// 出力ストライド: 8 / 16 / 32。小さいほど高精度・低速。
    #[serde(default = "default_output_stride")]
    pub output_stride: u32,
    /// 推論前にフレームを縮小する係数 (0.0〜1.0]
    #[serde(default = "default_image_scale_factor")]
    pub image_scale_factor: f32,
}

fn default_model_variant() -> ModelVariant { ModelVariant::Lightning }
fn default_output_stride() -> u32 { 16 }
fn default_image_scale_factor() -> f32 { 0.5 }

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            model_variant: default_model_variant(),
            output_stride: default_output_stride(),
            image_scale_factor: default_image_scale_factor(),
        }
    }
}

/// シングルポーズ用の閾値
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SinglePoseSettings {
    #[serde(default = "default_single_min_pose")]
    pub min_pose_confidence: f32,
    #[serde(default = "default_single_min_part")]
    pub min_part_confidence: f32,
}

fn default_single_min_pose() -> f32 { 0.1 }
fn default_single_min_part() -> f32 { 0.5 }

impl Default for SinglePoseSettings {
    fn default() -> Self {
        Self {
            min_pose_confidence: default_single_min_pose(),
            min_part_confidence: default_single_min_part(),
        }
    }
}

/// マルチポーズ用のパラメータ
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MultiPoseSettings {
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
    #[serde(default = "default_multi_min_pose")]
    pub min_pose_confidence: f32,
    #[serde(default = "default_multi_min_part")]
    pub min_part_confidence: f32,
    /// 検出同士の最小距離（ピクセル）。近接する重複検出を抑制する。
    #[serde(default = "default_nms_radius")]
    pub nms_radius: f32,
}

fn default_max_detections() -> usize { 5 }
fn default_multi_min_pose() -> f32 { 0.15 }
fn default_multi_min_part() -> f32 { 0.1 }
fn default_nms_radius() -> f32 { 30.0 }

impl Default for MultiPoseSettings {
    fn default() -> Self {
        Self {
            max_detections: default_max_detections(),
            min_pose_confidence: default_multi_min_pose(),
            min_part_confidence: default_multi_min_part(),
            nms_radius: default_nms_radius(),
        }
    }
}

/// 描画トグル
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_true")]
    pub show_video: bool,
    #[serde(default = "default_true")]
    pub show_skeleton: bool,
    #[serde(default = "default_true")]
    pub show_points: bool,
    #[serde(default = "default_false")]
    pub show_bounding_box: bool,
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            show_video: true,
            show_skeleton: true,
            show_points: true,
            show_bounding_box: false,
        }
    }
}

/// 実行中に変更可能な設定一式
///
/// パネルが書き込み、ループが毎周スナップショット（clone）を読む。
/// コアは数値の範囲検証をしない。範囲外の閾値は全ポーズを
/// 通すか全て落とすだけで、エラーにはならない。
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub single_pose: SinglePoseSettings,
    #[serde(default)]
    pub multi_pose: MultiPoseSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

fn default_algorithm() -> Algorithm { Algorithm::MultiPose }

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            input: InputSettings::default(),
            single_pose: SinglePoseSettings::default(),
            multi_pose: MultiPoseSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

/// ループとパネルで共有する設定ストア
///
/// ループは関連フィールド間の不整合を避けるため、フィールド単位ではなく
/// snapshot() で一括コピーを取る。
#[derive(Clone)]
pub struct SharedSettings(Arc<Mutex<Settings>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(Mutex::new(settings)))
    }

    /// 現在値の一括コピー
    pub fn snapshot(&self) -> Settings {
        self.0.lock().unwrap().clone()
    }

    /// パネルからの更新
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.0.lock().unwrap());
    }
}

/// カメラソースの起動設定
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_index")]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

fn default_camera_index() -> i32 { 0 }
fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: default_camera_index(),
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

/// 動画ファイルソースの起動設定
#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_video_path")]
    pub path: String,
}

fn default_video_path() -> String { "assets/dance.mp4".to_string() }

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            path: default_video_path(),
        }
    }
}

/// モデル配置
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: String,
}

fn default_model_dir() -> String { "models".to_string() }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            video: VideoConfig::default(),
            model: ModelConfig::default(),
            settings: Settings::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 読めなければデフォルトで起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "設定ファイル {} を読めません ({e})。デフォルト設定で起動します",
                    path.as_ref().display()
                );
                Self::default()
            }
        }
    }
}
