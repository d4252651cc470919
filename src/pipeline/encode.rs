//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Phone photos of lab reports routinely arrive at 4000 px and more, well
//! past what vision APIs tile at full detail, so uploads are scaled down to
//! the same pixel cap as rendered PDF pages before encoding. PNG keeps the
//! digits crisp; `detail: "high"` keeps small table text visible to models
//! that tile images.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Scale `img` down so neither edge exceeds `max_pixels`, preserving aspect ratio.
pub fn fit_within(img: DynamicImage, max_pixels: u32) -> DynamicImage {
    if img.width() <= max_pixels && img.height() <= max_pixels {
        return img;
    }
    debug!(
        "Downscaling {}x{} px image to fit {} px",
        img.width(),
        img.height(),
        max_pixels
    );
    img.resize(max_pixels, max_pixels, FilterType::Lanczos3)
}

/// Encode a page image as a base64 PNG ready for the VLM API.
pub fn encode_page(img: DynamicImage, max_pixels: u32) -> Result<ImageData, image::ImageError> {
    let img = fit_within(img, max_pixels);

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} px page → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
