//! RGB8 image frames
//!
//! Minimal owned image used to carry face crops into the rPPG processor
//! and the emotion classifier. Only the operations those consumers need:
//! bounded crops and channel means.

use crate::error::SignalError;

/// Row-major RGB8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Raw RGB8 pixel data (row-major)
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap raw RGB8 data; the buffer must hold exactly `width * height * 3` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, SignalError> {
        if data.len() != (width as usize) * (height as usize) * 3 {
            return Err(SignalError::InsufficientSamples {
                needed: (width as usize) * (height as usize) * 3,
                got: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Black frame
    pub fn empty(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0])
    }

    /// Frame of a single uniform color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self { data, width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get pixel at (x, y) as [R, G, B]
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// Crop the pixel rectangle `[x1, x2) x [y1, y2)`, clamped to the image.
    ///
    /// Returns `EmptyCrop` when nothing of the rectangle lies inside the frame.
    pub fn crop(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Frame, SignalError> {
        // truncate like integer pixel casts, then clamp
        let clamp_x = |v: f32| (v.max(0.0) as u32).min(self.width);
        let clamp_y = |v: f32| (v.max(0.0) as u32).min(self.height);
        let (x1, x2) = (clamp_x(x1), clamp_x(x2));
        let (y1, y2) = (clamp_y(y1), clamp_y(y2));

        if x2 <= x1 || y2 <= y1 {
            return Err(SignalError::EmptyCrop);
        }

        let (w, h) = (x2 - x1, y2 - y1);
        let mut data = Vec::with_capacity((w as usize) * (h as usize) * 3);
        for y in y1..y2 {
            let row = (y as usize) * (self.width as usize);
            let start = (row + x1 as usize) * 3;
            let end = (row + x2 as usize) * 3;
            data.extend_from_slice(&self.data[start..end]);
        }

        Ok(Frame {
            data,
            width: w,
            height: h,
        })
    }

    /// Mean of each channel over all pixels, `[R, G, B]`.
    pub fn mean_rgb(&self) -> Option<[f64; 3]> {
        if self.is_empty() {
            return None;
        }
        let mut sum = [0.0f64; 3];
        for px in self.data.chunks_exact(3) {
            sum[0] += px[0] as f64;
            sum[1] += px[1] as f64;
            sum[2] += px[2] as f64;
        }
        let count = (self.width as f64) * (self.height as f64);
        Some([sum[0] / count, sum[1] / count, sum[2] / count])
    }

    /// Mean grayscale intensity (ITU-R BT.601 luma).
    pub fn brightness(&self) -> Option<f64> {
        self.mean_rgb()
            .map(|[r, g, b]| 0.299 * r + 0.587 * g + 0.114 * b)
    }
}
