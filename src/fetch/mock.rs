use crate::fetch::{ImageSource, SourceError};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use std::collections::VecDeque;
use std::io::Cursor;

#[derive(Debug, Clone)]
pub enum MockResponse {
    Bytes(Vec<u8>),
    Status(u16),
    Fail(String),
}

/// Replays a scripted sequence of responses; once the script runs out
/// every request fails.
#[derive(Debug, Default)]
pub struct MockImageSource {
    script: VecDeque<MockResponse>,
    requests: Vec<String>,
}

impl MockImageSource {
    pub fn new(script: Vec<MockResponse>) -> Self {
        Self {
            script: script.into(),
            requests: Vec::new(),
        }
    }

    pub fn push(&mut self, response: MockResponse) {
        self.script.push_back(response);
    }

    pub fn requests(&self) -> &[String] {
        &self.requests
    }
}

impl ImageSource for MockImageSource {
    fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.requests.push(url.to_string());
        match self.script.pop_front() {
            Some(MockResponse::Bytes(bytes)) => Ok(bytes),
            Some(MockResponse::Status(code)) => Err(SourceError::Status(code)),
            Some(MockResponse::Fail(reason)) => Err(SourceError::Transport(reason)),
            None => Err(SourceError::Transport("mock script exhausted".to_string())),
        }
    }
}

/// Encode an image as BMP. Uncompressed, so the payload size does not
/// depend on the content and clears the truncation check for any
/// reasonably sized frame.
pub fn encode_frame(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Bmp)?;
    Ok(cursor.into_inner())
}

/// Uniform gray frame.
pub fn flat_frame(width: u32, height: u32, level: u8) -> Result<Vec<u8>, image::ImageError> {
    let gray = GrayImage::from_pixel(width, height, image::Luma([level]));
    encode_frame(&DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray).to_rgb8()))
}

/// Left half at `dark`, right half at `bright`. Two identical split frames
/// look like a stalled, half-covered road.
pub fn split_frame(
    width: u32,
    height: u32,
    dark: u8,
    bright: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let rgb = RgbImage::from_fn(width, height, |x, _| {
        let level = if x < width / 2 { dark } else { bright };
        image::Rgb([level, level, level])
    });
    encode_frame(&DynamicImage::ImageRgb8(rgb))
}

/// Deterministic pseudo-random RGB frame.
pub fn noise_frame(width: u32, height: u32, seed: u32) -> Result<Vec<u8>, image::ImageError> {
    let mut state = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let rgb = RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        image::Rgb([next(), next(), next()])
    });
    encode_frame(&DynamicImage::ImageRgb8(rgb))
}
