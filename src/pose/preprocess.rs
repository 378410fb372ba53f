use anyhow::Result;
use ndarray::Array4;
use opencv::{
    core::{self, Mat, Size, CV_32FC3},
    imgproc,
    prelude::*,
};

use super::estimator::InferenceParams;

/// OpenCV Mat を推論入力テンソルに変換
///
/// - flip_horizontal なら左右反転（ミラー表示用）
/// - image_scale_factor で縮小してからモデル入力サイズへリサイズ
/// - BGR -> RGB
/// - [1, size, size, 3] の f32 テンソル (0.0-255.0)
pub fn frame_to_tensor(frame: &Mat, input_size: i32, params: &InferenceParams) -> Result<Array4<f32>> {
    let mut current = frame.clone();

    if params.flip_horizontal {
        let mut flipped = Mat::default();
        core::flip(&current, &mut flipped, 1)?;
        current = flipped;
    }

    // 範囲内のときだけ縮小を適用（範囲外の値は無視）
    let scale = params.image_scale_factor;
    if scale > 0.0 && scale < 1.0 {
        let mut scaled = Mat::default();
        imgproc::resize(
            &current,
            &mut scaled,
            Size::new(0, 0),
            scale as f64,
            scale as f64,
            imgproc::INTER_LINEAR,
        )?;
        current = scaled;
    }

    // BGR -> RGB
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(&current, &mut rgb, imgproc::COLOR_BGR2RGB)?;

    // モデル入力サイズへリサイズ
    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(input_size, input_size),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    // f32 に変換
    let mut float_mat = Mat::default();
    resized.convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)?;

    // ndarray に変換 [1, size, size, 3]
    let size = input_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));

    for y in 0..input_size {
        for x in 0..input_size {
            let pixel = float_mat.at_2d::<opencv::core::Vec3f>(y, x)?;
            tensor[[0, y as usize, x as usize, 0]] = pixel[0];
            tensor[[0, y as usize, x as usize, 1]] = pixel[1];
            tensor[[0, y as usize, x as usize, 2]] = pixel[2];
        }
    }

    Ok(tensor)
}
