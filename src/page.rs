use image::{DynamicImage, GenericImageView, ImageReader, RgbaImage};
use std::fs;
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Decoded page data (CPU side)
// ---------------------------------------------------------------------------

pub struct Pixbuf {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub format_name: String,
    /// Set on the placeholder shown for pages that could not be decoded.
    pub is_placeholder: bool,
}

impl Pixbuf {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }

    pub fn is_wide(&self) -> bool {
        self.width > self.height
    }

    fn from_image(img: DynamicImage, file_size: u64, format_name: String) -> Self {
        let (width, height) = img.dimensions();
        Self {
            rgba_bytes: img.to_rgba8().into_raw(),
            width,
            height,
            file_size,
            format_name,
            is_placeholder: false,
        }
    }
}

impl std::fmt::Debug for Pixbuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pixbuf")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format_name", &self.format_name)
            .field("is_placeholder", &self.is_placeholder)
            .finish()
    }
}

pub fn decode_image(path: &Path, target_size: Option<(u32, u32)>) -> Result<Pixbuf, String> {
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let img = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| format!("{}", e))?
        .decode()
        .map_err(|e| format!("{}", e))?;

    let format_name = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_uppercase();

    let img = match target_size {
        Some((w, h)) => img.thumbnail(w.max(1), h.max(1)),
        None => img,
    };
    Ok(Pixbuf::from_image(img, file_size, format_name))
}

/// Width and height from the file header, or `(0, 0)` when unreadable.
pub fn image_size(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap_or((0, 0))
}

/// Upper-case name of the detected image format ("PNG", "JPEG", ...).
pub fn mime_name(path: &Path) -> Option<String> {
    let format = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .ok()?
        .format()?;
    Some(format!("{:?}", format).to_uppercase())
}

const MISSING_SIDE: u32 = 48;

/// Stand-in bitmap for pages that are missing or fail to decode: a grey
/// square crossed out in red.
pub fn missing_image() -> Arc<Pixbuf> {
    let mut img = RgbaImage::from_pixel(MISSING_SIDE, MISSING_SIDE, image::Rgba([90, 90, 90, 255]));
    for i in 0..MISSING_SIDE {
        for t in 0..3u32 {
            let a = (i + t).min(MISSING_SIDE - 1);
            img.put_pixel(i, a, image::Rgba([200, 40, 40, 255]));
            img.put_pixel(MISSING_SIDE - 1 - i, a, image::Rgba([200, 40, 40, 255]));
        }
    }
    Arc::new(Pixbuf {
        rgba_bytes: img.into_raw(),
        width: MISSING_SIDE,
        height: MISSING_SIDE,
        file_size: 0,
        format_name: "MISSING".to_string(),
        is_placeholder: true,
    })
}
