//! Image encoding: raw image bytes → base64 `ImageData` for vision calls.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body, and all of them take PNG and JPEG.
//! Images already in one of those formats are sent as-is; anything else
//! (GIF from a wiki link, BMP pasted into a DOCX) is decoded and
//! re-encoded as lossless PNG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode an image for a vision request.
///
/// `detail: "high"` asks GPT-4-class models to tile the image at full
/// resolution; diagram labels are small and lost at the low setting.
pub fn encode_image(bytes: &[u8]) -> Result<ImageData, image::ImageError> {
    let format = image::guess_format(bytes)?;
    let (payload, mime) = match format {
        ImageFormat::Png => (bytes.to_vec(), "image/png"),
        ImageFormat::Jpeg => (bytes.to_vec(), "image/jpeg"),
        _ => (to_png(&image::load_from_memory(bytes)?)?, "image/png"),
    };

    let b64 = STANDARD.encode(&payload);
    debug!("Encoded {:?} image → {} bytes base64", format, b64.len());

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

/// PNG-encode a decoded image.
pub fn to_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
