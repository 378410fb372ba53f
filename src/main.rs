use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use poseview::camera::{ThreadedCamera, VideoFileSource};
use poseview::config::{Config, SharedSettings};
use poseview::driver::run_loop;
use poseview::panel;

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);

    println!("=== poseview {} ===", env!("GIT_VERSION"));
    println!("Model dir: {}", config.model.dir);
    println!("Algorithm: {:?}", config.settings.algorithm);
    println!("Model variant: {}", config.settings.input.model_variant.label());
    println!();
    println!("{}", panel::HELP);
    println!();

    let settings = SharedSettings::new(config.settings.clone());
    let stop = Arc::new(AtomicBool::new(false));
    let model_dir = PathBuf::from(&config.model.dir);

    let mut handles = Vec::new();

    // カメラソース。失敗しても動画ソースの起動は試みる。
    match ThreadedCamera::start(
        config.camera.index,
        Some(config.camera.width),
        Some(config.camera.height),
    ) {
        Ok(camera) => {
            let (w, h) = camera.resolution();
            println!("Camera: {}x{}", w, h);
            let settings = settings.clone();
            let stop = stop.clone();
            let model_dir = model_dir.clone();
            handles.push((
                "camera",
                thread::spawn(move || {
                    run_loop(camera, "poseview - camera", true, settings, stop, model_dir)
                }),
            ));
        }
        Err(e) => eprintln!("カメラを利用できません: {e:#}"),
    }

    // 動画ファイルソース
    match VideoFileSource::open(&config.video.path) {
        Ok(video) => {
            println!("Video: {}", config.video.path);
            let settings = settings.clone();
            let stop = stop.clone();
            let model_dir = model_dir.clone();
            handles.push((
                "video",
                thread::spawn(move || {
                    run_loop(video, "poseview - video", false, settings, stop, model_dir)
                }),
            ));
        }
        Err(e) => eprintln!("動画ファイルを読み込めません: {e:#}"),
    }

    if handles.is_empty() {
        anyhow::bail!("no video source available");
    }

    let mut first_error = None;
    for (name, handle) in handles {
        match handle.join() {
            Ok(Ok(())) => println!("{name} loop finished"),
            Ok(Err(e)) => {
                eprintln!("{name} loop failed: {e:#}");
                first_error.get_or_insert(e);
            }
            Err(_) => eprintln!("{name} loop panicked"),
        }
        // 片方が終わったら残りのループも止める
        stop.store(true, Ordering::Relaxed);
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            println!("Shutting down...");
            Ok(())
        }
    }
}
