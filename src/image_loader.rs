use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageError, ImageOutputFormat, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] ImageError),
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {1}", .0.display())]
    Read(PathBuf, io::Error),
}

/// Reads raw image bytes, distinguishing an absent file from an unreadable one.
pub fn read_image_bytes(path: &Path) -> Result<Vec<u8>, ImageLoadError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(ImageLoadError::NotFound(path.to_path_buf()))
        }
        Err(err) => Err(ImageLoadError::Read(path.to_path_buf(), err)),
    }
}

/// Decodes an in-memory image into an RGBA8 buffer.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, ImageLoadError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Encodes an RGBA buffer as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}

/// Writes bytes to `path`, creating parent directories first.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_nonexistent_file() {
        let result = read_image_bytes(Path::new("/nonexistent/path/image.png"));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ImageLoadError::NotFound(_)));
    }

    #[test]
    fn decode_rejects_garbage_bytes() {
        let result = decode_rgba(b"definitely not a png");
        assert!(matches!(result, Err(ImageLoadError::Decode(_))));
    }

    #[test]
    fn encode_then_decode_preserves_pixels() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([0, 128, 0, 255]));
        let bytes = encode_png(&img).expect("encode png");
        let decoded = decode_rgba(&bytes).expect("decode png");
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.as_raw(), img.as_raw());
    }

    #[test]
    fn write_bytes_creates_parent_directories() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("deeper").join("out.png");
        let img = RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        write_bytes(&path, &encode_png(&img).unwrap()).expect("write image");
        assert!(path.exists());
        assert_eq!(decode_rgba(&read_image_bytes(&path).unwrap()).unwrap().width(), 1);
    }
}
