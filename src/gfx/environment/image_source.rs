//! Image decode collaborator

use std::path::PathBuf;

use futures::future::BoxFuture;

/// RGBA8 pixels of one decoded image
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// Image of one flat colour
    pub fn solid(size: u32, rgba: [u8; 4]) -> Self {
        Self {
            width: size,
            height: size,
            rgba: rgba.repeat(size as usize * size as usize),
        }
    }
}

/// Turns a source identifier into decoded pixels; may fail per image
pub trait ImageSource: Send + Sync {
    fn decode<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<DecodedImage, String>>;
}

/// Decodes image files below a root directory with the `image` crate
#[derive(Clone, Debug)]
pub struct FileImageSource {
    root: PathBuf,
}

impl FileImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for FileImageSource {
    fn decode<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<DecodedImage, String>> {
        Box::pin(async move {
            let path = self.root.join(source);
            let image = image::open(&path)
                .map_err(|err| format!("{}: {}", path.display(), err))?
                .to_rgba8();
            Ok(DecodedImage {
                width: image.width(),
                height: image.height(),
                rgba: image.into_raw(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_files_as_rgba() {
        let root = std::env::temp_dir().join(format!("shadeview-images-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]))
            .save(root.join("face.png"))
            .unwrap();

        let source = FileImageSource::new(&root);
        let decoded = pollster::block_on(source.decode("face.png")).unwrap();
        let missing = pollster::block_on(source.decode("missing.png"));
        std::fs::remove_dir_all(&root).ok();

        assert_eq!(decoded, DecodedImage::solid(4, [10, 20, 30, 255]));
        assert!(missing.unwrap_err().contains("missing.png"));
    }
}
