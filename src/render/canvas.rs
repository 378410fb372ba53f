#[cfg(feature = "desktop")]
use anyhow::Result;
#[cfg(feature = "desktop")]
use opencv::{
    core::{self, Mat, Size},
    imgproc,
    prelude::*,
};

/// 固定サイズの2Dラスタサーフェス
///
/// 毎サイクル clear してから描き直す。ピクセルは 0x00RRGGBB。
pub struct Canvas {
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            buffer: vec![0u32; width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// 全面を黒にクリア
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            Some(self.buffer[y as usize * self.width + x as usize])
        } else {
            None
        }
    }

    /// ピクセルをセット（境界チェック付き）
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }

    /// Bresenhamのアルゴリズムで線を描画
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.set_pixel(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    pub fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// 矩形の枠線を描画
    pub fn draw_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        self.draw_line(x0, y0, x1, y0, color);
        self.draw_line(x1, y0, x1, y1, color);
        self.draw_line(x1, y1, x0, y1, color);
        self.draw_line(x0, y1, x0, y0, color);
    }

    /// BGRフレームをサーフェス全面にブリット
    ///
    /// mirror のときは左右反転して描く。反転は映像ピクセルだけに
    /// 作用する（キーポイント座標はすでに反転済みで報告される）。
    #[cfg(feature = "desktop")]
    pub fn draw_frame(&mut self, frame: &Mat, mirror: bool) -> Result<()> {
        let mut source = frame.clone();

        if mirror {
            let mut flipped = Mat::default();
            core::flip(&source, &mut flipped, 1)?;
            source = flipped;
        }

        let mut resized = Mat::default();
        imgproc::resize(
            &source,
            &mut resized,
            Size::new(self.width as i32, self.height as i32),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        for y in 0..self.height {
            for x in 0..self.width {
                let pixel = resized.at_2d::<opencv::core::Vec3b>(y as i32, x as i32)?;
                // BGR -> RGB -> u32
                let r = pixel[2] as u32;
                let g = pixel[1] as u32;
                let b = pixel[0] as u32;
                self.buffer[y * self.width + x] = (r << 16) | (g << 8) | b;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canvas_is_black() {
        let canvas = Canvas::new(10, 10);
        assert!(canvas.buffer().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_clear_resets_pixels() {
        let mut canvas = Canvas::new(10, 10);
        canvas.set_pixel(3, 4, 0xFF00FF);
        canvas.clear();
        assert_eq!(canvas.pixel(3, 4), Some(0));
    }

    #[test]
    fn test_set_pixel_out_of_bounds_is_ignored() {
        let mut canvas = Canvas::new(10, 10);
        canvas.set_pixel(-1, 0, 0xFFFFFF);
        canvas.set_pixel(10, 0, 0xFFFFFF);
        canvas.set_pixel(0, 10, 0xFFFFFF);
        assert!(canvas.buffer().iter().all(|&p| p == 0));
        assert_eq!(canvas.pixel(10, 0), None);
    }

    #[test]
    fn test_line_covers_endpoints() {
        let mut canvas = Canvas::new(20, 20);
        canvas.draw_line(2, 3, 15, 11, 0x123456);
        assert_eq!(canvas.pixel(2, 3), Some(0x123456));
        assert_eq!(canvas.pixel(15, 11), Some(0x123456));
    }

    #[test]
    fn test_circle_fills_center_and_respects_radius() {
        let mut canvas = Canvas::new(20, 20);
        canvas.draw_circle(10, 10, 3, 0x00FF00);
        assert_eq!(canvas.pixel(10, 10), Some(0x00FF00));
        assert_eq!(canvas.pixel(10, 13), Some(0x00FF00));
        // 半径の外は塗られない
        assert_eq!(canvas.pixel(10, 14), Some(0));
    }

    #[test]
    fn test_rect_outline_only() {
        let mut canvas = Canvas::new(20, 20);
        canvas.draw_rect(2, 2, 10, 8, 0xFF0000);
        assert_eq!(canvas.pixel(2, 2), Some(0xFF0000));
        assert_eq!(canvas.pixel(10, 8), Some(0xFF0000));
        assert_eq!(canvas.pixel(6, 2), Some(0xFF0000));
        // 内側は塗られない
        assert_eq!(canvas.pixel(6, 5), Some(0));
    }
}
