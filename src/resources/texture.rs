//! Texture loading and management

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::backend::{
    BackendResult, GraphicsBackend, TextureDescriptor, TextureFormat, TextureHandle,
    TextureUsage, TextureViewHandle,
};
use crate::error::{EngineError, EngineResult};

/// Decoded RGBA8 pixels
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Decode an image file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|e| EngineError::ResourceLoad {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_image(img, &name))
    }

    /// Decode an in-memory image (PNG, JPEG, ...)
    pub fn from_bytes(bytes: &[u8], name: &str) -> EngineResult<Self> {
        let img = image::load_from_memory(bytes).map_err(|e| EngineError::ResourceLoad {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            data: img.to_rgba8().into_raw(),
            name: name.to_string(),
        }
    }

    /// 1x1 texture of a single color
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    pub fn black() -> Self {
        Self::solid_color([0, 0, 0, 255], "black")
    }

    /// Flat tangent-space normal (0, 0, 1), stored linear
    pub fn default_normal() -> Self {
        Self {
            format: TextureFormat::Rgba8Unorm,
            ..Self::solid_color([128, 128, 255, 255], "default_normal")
        }
    }

    /// `size` x `size` checkerboard with 8 pixel cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                data.extend_from_slice(if is_even { &color1 } else { &color2 });
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: "checkerboard".to_string(),
        }
    }

    /// Pixel data must cover exactly `width * height` RGBA8 texels
    pub fn validate(&self) -> EngineResult<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(EngineError::ResourceLoad {
                name: self.name.clone(),
                reason: format!(
                    "{}x{} texture needs {} bytes, got {}",
                    self.width,
                    self.height,
                    expected,
                    self.data.len()
                ),
            });
        }
        Ok(())
    }
}

/// Texture uploaded to the GPU, with its sampling view
#[derive(Debug)]
pub struct Texture {
    name: String,
    handle: TextureHandle,
    view: TextureViewHandle,
    width: u32,
    height: u32,
    format: TextureFormat,
}

impl Texture {
    pub(crate) fn upload<B: GraphicsBackend>(
        backend: &mut B,
        data: &TextureData,
    ) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            ..Default::default()
        })?;

        let view = match backend.create_texture_view(handle) {
            Ok(view) => view,
            Err(err) => {
                backend.destroy_texture(handle);
                return Err(err);
            }
        };
        backend.write_texture(handle, &data.data, data.width, data.height);

        Ok(Self {
            name: data.name.clone(),
            handle,
            view,
            width: data.width,
            height: data.height,
            format: data.format,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub(crate) fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub(crate) fn view(&self) -> TextureViewHandle {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_every_eight_pixels() {
        let red = [255, 0, 0, 255];
        let blue = [0, 0, 255, 255];
        let tex = TextureData::checkerboard(16, red, blue);
        assert!(tex.validate().is_ok());

        let pixel = |x: usize, y: usize| &tex.data[(y * 16 + x) * 4..][..4];
        assert_eq!(pixel(0, 0), &red);
        assert_eq!(pixel(7, 7), &red);
        assert_eq!(pixel(8, 0), &blue);
        assert_eq!(pixel(8, 8), &red);
    }

    #[test]
    fn mismatched_data_is_rejected() {
        let mut tex = TextureData::white();
        tex.data.push(0);
        assert!(matches!(
            tex.validate(),
            Err(EngineError::ResourceLoad { .. })
        ));
    }

    #[test]
    fn bad_bytes_fail_to_decode() {
        assert!(TextureData::from_bytes(&[1, 2, 3], "junk").is_err());
    }

    #[test]
    fn decodes_png_from_memory() {
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageOutputFormat::Png,
            )
            .unwrap();

        let tex = TextureData::from_bytes(&bytes, "tiny").unwrap();
        assert_eq!((tex.width, tex.height), (2, 3));
        assert_eq!(&tex.data[..4], &[10, 20, 30, 255]);
    }
}
