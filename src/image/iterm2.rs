// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The iTerm2 inline-image protocol encoder (§4.4).

use base64::Engine as _;

use crate::error::EncodeError;
use crate::image::ImageBuffer;

/// Encodes `image` to PNG and wraps it in the iTerm2 `OSC 1337` inline-image
/// sequence (§4.4 "iTerm2: encode image to PNG bytes, emit ...").
pub fn encode(image: &ImageBuffer, cell_px_width: u32, cell_px_height: u32) -> Result<String, EncodeError> {
    let png_bytes = to_png(image)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes);

    Ok(format!(
        "\x1b]1337;File=name={name};inline=1;doNotMoveCursor=1;width={w}px;height={h}px;preserveAspectRatio=1:{data}\x07",
        name = base64::engine::general_purpose::STANDARD.encode("vtscreen-image"),
        w = cell_px_width,
        h = cell_px_height,
        data = b64,
    ))
}

fn to_png(image: &ImageBuffer) -> Result<Vec<u8>, EncodeError> {
    let mut rgb_bytes = Vec::with_capacity(image.pixels().len() * 3);
    for pixel in image.pixels() {
        rgb_bytes.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
    }

    let buffer = image::RgbImage::from_raw(image.width, image.height, rgb_bytes)
        .ok_or(EncodeError::DimensionMismatch { width: image.width, height: image.height })?;

    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    #[test]
    fn encode_emits_osc_1337_wrapper() {
        let image = ImageBuffer::filled(4, 4, Rgb::new(10, 20, 30));
        let sequence = encode(&image, 32, 32).expect("encode should succeed");
        assert!(sequence.starts_with("\x1b]1337;File="));
        assert!(sequence.ends_with('\x07'));
        assert!(sequence.contains("width=32px"));
        assert!(sequence.contains("height=32px"));
    }
}
