//! フレームループ駆動部
//!
//! ソースごとに1本、設定スナップショット → フレーム取得 → 推論 →
//! 描画 → 次フレーム待ち、を終了まで繰り返す。カメラループと
//! 動画ループは独立しており、片方の失敗は他方に影響しない。

use anyhow::{anyhow, Result};
use opencv::core::Mat;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::FrameSource;
use crate::config::{Algorithm, ModelVariant, Settings, SharedSettings};
use crate::panel;
use crate::pose::{InferenceParams, MoveNet, MultiPoseParams, Pose, PoseEstimator};
use crate::render::{self, overlay, Canvas, DisplayWindow, RenderParams};

/// 次の表示フレームまでの待機（約60Hz、これより速くはならない）
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// 1ソース分のループ状態
///
/// エンジンインスタンスはループが排他的に所有する。設定の
/// バリアントが保持中のものと食い違ったら交換要求とみなし、
/// 旧エンジンを解放してから新しいものを読み込む。
pub struct FrameLoop<E, L>
where
    E: PoseEstimator,
    L: FnMut(ModelVariant) -> Result<E>,
{
    engine: Option<E>,
    variant: ModelVariant,
    load: L,
}

impl<E, L> FrameLoop<E, L>
where
    E: PoseEstimator,
    L: FnMut(ModelVariant) -> Result<E>,
{
    pub fn new(variant: ModelVariant, mut load: L) -> Result<Self> {
        let engine = load(variant)?;
        Ok(Self {
            engine: Some(engine),
            variant,
            load,
        })
    }

    /// 1周分の処理: モデル交換 → 推論 → 描画
    ///
    /// 返したポーズは統計表示用。描画後は破棄してよい。
    pub fn tick(
        &mut self,
        frame: &Mat,
        settings: &Settings,
        canvas: &mut Canvas,
        mirror: bool,
    ) -> Result<Vec<Pose>> {
        if settings.input.model_variant != self.variant {
            // 旧モデルの資源を解放してから新モデルを取得する
            self.engine = None;
            self.engine = Some((self.load)(settings.input.model_variant)?);
            self.variant = settings.input.model_variant;
        }

        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| anyhow!("no engine loaded"))?;

        let params = InferenceParams::from_settings(settings, mirror);
        let poses = match settings.algorithm {
            Algorithm::SinglePose => vec![engine.estimate_single(frame, &params)?],
            Algorithm::MultiPose => {
                let multi = MultiPoseParams::from_settings(settings);
                engine.estimate_multiple(frame, &params, &multi)?
            }
        };

        let render_params = RenderParams::from_settings(settings);
        let frame_to_draw = settings.output.show_video.then_some(frame);
        overlay::render(canvas, frame_to_draw, &poses, &render_params, mirror)?;

        Ok(poses)
    }
}

/// 1ソース分のループを終了まで回す
///
/// ウィンドウが閉じられるか stop が立つまで走り続ける。
/// フレーム取得・モデル読込・推論の失敗はこのループにとって
/// 致命的で、リトライせずエラーを返して終了する。
pub fn run_loop<S: FrameSource>(
    mut source: S,
    title: &str,
    mirror: bool,
    settings: SharedSettings,
    stop: Arc<AtomicBool>,
    model_dir: PathBuf,
) -> Result<()> {
    let mut window = DisplayWindow::new(title, render::SURFACE_WIDTH, render::SURFACE_HEIGHT)?;
    let mut canvas = Canvas::new(render::SURFACE_WIDTH, render::SURFACE_HEIGHT);

    let initial_variant = settings.snapshot().input.model_variant;
    let mut frame_loop =
        FrameLoop::new(initial_variant, move |variant| MoveNet::load(&model_dir, variant))?;
    println!("[{title}] model loaded ({})", initial_variant.label());

    // FPS計測
    let mut frame_count = 0u32;
    let mut fps_timer = Instant::now();

    while window.is_open() && !stop.load(Ordering::Relaxed) {
        panel::handle_input(&window, &settings);

        let snapshot = settings.snapshot();
        let frame = source.current_frame()?;
        let poses = frame_loop.tick(&frame, &snapshot, &mut canvas, mirror)?;
        window.present(&canvas)?;

        frame_count += 1;
        let elapsed = fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let top_score = poses.first().map(|p| p.score).unwrap_or(0.0);
            println!(
                "[{title}] FPS: {:.1}, poses: {}, top score: {:.2}",
                frame_count as f32 / elapsed,
                poses.len(),
                top_score
            );
            frame_count = 0;
            fps_timer = Instant::now();
        }

        thread::sleep(FRAME_INTERVAL);
    }

    Ok(())
}
