use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::Array4;

use super::model::InferenceError;

/// Side length the classifier was trained on.
pub const INPUT_SIZE: u32 = 256;
pub const CHANNELS: usize = 3;

/// Channels-last `[1, height, width, 3]` array of raw 0-255 pixel values.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    pub fn dims(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }

    #[cfg(test)]
    pub fn pixel(&self, y: usize, x: usize) -> [f32; CHANNELS] {
        [
            self.data[[0, y, x, 0]],
            self.data[[0, y, x, 1]],
            self.data[[0, y, x, 2]],
        ]
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, InferenceError> {
    image::load_from_memory(bytes).map_err(|e| InferenceError::Decode(e.to_string()))
}

pub fn to_input_tensor(img: &DynamicImage, size: u32) -> Result<ImageTensor, InferenceError> {
    let rgb = img.resize_exact(size, size, FilterType::Nearest).to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels: Vec<f32> = rgb.into_raw().into_iter().map(f32::from).collect();
    let data = Array4::from_shape_vec((1, height as usize, width as usize, CHANNELS), pixels)
        .map_err(|e| InferenceError::Shape(e.to_string()))?;
    Ok(ImageTensor { data })
}

pub fn preprocess(bytes: &[u8]) -> Result<ImageTensor, InferenceError> {
    let img = decode_image(bytes)?;
    log::debug!("Decoded {}x{} image", img.width(), img.height());
    to_input_tensor(&img, INPUT_SIZE)
}
