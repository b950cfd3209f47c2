use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::debug;
use meshtracer_shared::RaytracerConfig;
use meshtracer_shader::TextureLayers;

use crate::error::TracerError;

/// Stack of fixed-size RGBA8 layers addressed by `Material::diffuse`
#[derive(Clone, Debug, Default)]
pub struct TextureArray {
    data: Vec<u8>,
    layers: u32,
}

impl TextureArray {
    pub const SIZE: u32 = RaytracerConfig::TEXTURE_SIZE;
    pub const LAYER_BYTES: usize =
        (Self::SIZE * Self::SIZE * RaytracerConfig::TEXTURE_BYTES_PER_PIXEL) as usize;

    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw layer that is already SIZE x SIZE RGBA8
    pub fn push_rgba(&mut self, name: &str, pixels: &[u8]) -> Result<u32, TracerError> {
        if pixels.len() != Self::LAYER_BYTES {
            return Err(TracerError::InvalidTexture {
                name: name.to_string(),
                reason: format!("expected {} bytes, got {}", Self::LAYER_BYTES, pixels.len()),
            });
        }
        self.data.extend_from_slice(pixels);
        self.layers += 1;
        debug!("Texture layer {} <- {}", self.layers - 1, name);
        Ok(self.layers - 1)
    }

    /// Append an image, resizing it to SIZE x SIZE when needed
    pub fn push_image(&mut self, name: &str, image: &RgbaImage) -> Result<u32, TracerError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(TracerError::InvalidTexture {
                name: name.to_string(),
                reason: "image is empty".to_string(),
            });
        }
        if image.dimensions() == (Self::SIZE, Self::SIZE) {
            return self.push_rgba(name, image.as_raw());
        }
        let resized = imageops::resize(image, Self::SIZE, Self::SIZE, FilterType::Triangle);
        self.push_rgba(name, resized.as_raw())
    }

    pub fn layer_count(&self) -> u32 {
        self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn layers(&self) -> TextureLayers<'_> {
        TextureLayers {
            data: &self.data,
            size: Self::SIZE,
            layers: self.layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_small_image_is_resized() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let mut textures = TextureArray::new();
        assert_eq!(textures.push_image("flat", &image).expect("valid image"), 0);
        assert_eq!(textures.as_bytes().len(), TextureArray::LAYER_BYTES);
        assert_eq!(&textures.as_bytes()[..4], &[10, 20, 30, 255]);
        assert_eq!(textures.layers().texel(0, 511, 511).x, 10.0 / 255.0);
    }

    #[test]
    fn test_wrong_raw_size_is_rejected() {
        let mut textures = TextureArray::new();
        let err = textures.push_rgba("short", &[0; 16]).unwrap_err();
        assert!(matches!(err, TracerError::InvalidTexture { .. }));
        assert!(textures.is_empty());
    }

    #[test]
    fn test_layers_are_indexed_in_order() {
        let mut textures = TextureArray::new();
        let red = RgbaImage::from_pixel(TextureArray::SIZE, TextureArray::SIZE, Rgba([255, 0, 0, 255]));
        let blue = RgbaImage::from_pixel(TextureArray::SIZE, TextureArray::SIZE, Rgba([0, 0, 255, 255]));
        assert_eq!(textures.push_image("red", &red).expect("red"), 0);
        assert_eq!(textures.push_image("blue", &blue).expect("blue"), 1);
        assert_eq!(textures.layer_count(), 2);
        assert_eq!(textures.layers().texel(1, 3, 3).z, 1.0);
    }
}
