//! Decoded textures and the asynchronous texture loader
//!
//! Textures are stored as RGBA8 pixels. Sampling state mirrors what the
//! viewer applies to every color map: sRGB, repeat wrapping, linear filtering.

use anyhow::Context;
use log::debug;

use crate::error::{ViewerError, ViewerResult};
use crate::loader::source::{AssetSource, LoadProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// URL or embedded-image label the pixels came from
    pub source: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows
    pub pixels: Vec<u8>,
    pub color_space: ColorSpace,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub generate_mipmaps: bool,
}

impl Texture {
    pub fn from_rgba8(source: &str, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            source: source.to_string(),
            width,
            height,
            pixels,
            color_space: ColorSpace::Srgb,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            generate_mipmaps: false,
        }
    }

    /// Decodes PNG or JPEG bytes
    pub fn decode(source: &str, bytes: &[u8]) -> anyhow::Result<Self> {
        let img = image::load_from_memory(bytes)
            .with_context(|| format!("failed to decode texture {source}"))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba8(source, width, height, img.into_raw()))
    }

    /// Switches to trilinear sampling with mipmaps, as texture compression does
    pub fn enable_mipmaps(&mut self) {
        self.generate_mipmaps = true;
        self.min_filter = TextureFilter::LinearMipmapLinear;
        self.mag_filter = TextureFilter::Linear;
    }

    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Fetches and decodes texture images
///
/// The returned future borrows only the source, never the scene.
pub struct TextureLoader<'s> {
    source: &'s dyn AssetSource,
}

impl<'s> TextureLoader<'s> {
    pub fn new(source: &'s dyn AssetSource) -> Self {
        Self { source }
    }

    pub async fn load(&self, url: &str) -> ViewerResult<Texture> {
        let mut on_progress = |p: LoadProgress| {
            if let Some(ratio) = p.ratio() {
                debug!("Texture {} {:.1}%", url, ratio * 100.0);
            }
        };
        let bytes = self
            .source
            .fetch(url, &mut on_progress)
            .await
            .map_err(|source| ViewerError::TextureLoad {
                url: url.to_string(),
                source,
            })?;

        Texture::decode(url, &bytes).map_err(|source| ViewerError::TextureLoad {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::loader::source::MemorySource;

    /// Encodes a solid-color PNG
    pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let texture = Texture::decode("red.png", &png_bytes(2, 3, [255, 0, 0, 255])).unwrap();
        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(texture.byte_size(), 2 * 3 * 4);
        assert_eq!(texture.wrap_s, WrapMode::Repeat);
        assert_eq!(texture.color_space, ColorSpace::Srgb);
    }

    #[test]
    fn test_loader_reports_decode_failure() {
        let source = MemorySource::new().with_asset("bad.png", vec![1, 2, 3]);
        let loader = TextureLoader::new(&source);
        let result = pollster::block_on(loader.load("bad.png"));
        assert!(matches!(result, Err(ViewerError::TextureLoad { .. })));
    }

    #[test]
    fn test_loader_decodes() {
        let source = MemorySource::new().with_asset("ok.png", png_bytes(1, 1, [0, 0, 255, 255]));
        let loader = TextureLoader::new(&source);
        let texture = pollster::block_on(loader.load("ok.png")).unwrap();
        assert_eq!(&texture.pixels[..], &[0, 0, 255, 255]);
    }
}
