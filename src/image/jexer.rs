// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The Jexer inline-image protocol encoder (§4.4): `OSC 444`.

use base64::Engine as _;

use crate::config::JexerImageFormat;
use crate::error::EncodeError;
use crate::image::ImageBuffer;

/// Encodes `image` per `format` and wraps it in the Jexer `OSC 444`
/// sequence (§4.4 "Jexer: ... where `fmt` is 1=PNG, 2=JPG, 0=raw RGB (with
/// dimensions prefix)").
pub fn encode(image: &ImageBuffer, format: JexerImageFormat) -> Result<String, EncodeError> {
    let (fmt_code, payload) = match format {
        JexerImageFormat::Disabled => return Ok(String::new()),
        JexerImageFormat::Png => (1, to_png(image)?),
        JexerImageFormat::Jpg => (2, to_jpg(image)?),
        JexerImageFormat::Rgb => (0, raw_rgb(image)),
    };

    let b64 = base64::engine::general_purpose::STANDARD.encode(payload);

    if fmt_code == 0 {
        Ok(format!(
            "\x1b]444;{fmt_code};0;[{w};{h};0;]{data}\x07",
            w = image.width,
            h = image.height,
            data = b64,
        ))
    } else {
        Ok(format!("\x1b]444;{fmt_code};0;{data}\x07", data = b64))
    }
}

fn raw_rgb(image: &ImageBuffer) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(image.pixels().len() * 3);
    for pixel in image.pixels() {
        bytes.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
    }
    bytes
}

fn to_rgb_image(image: &ImageBuffer) -> Result<image::RgbImage, EncodeError> {
    image::RgbImage::from_raw(image.width, image.height, raw_rgb(image))
        .ok_or(EncodeError::DimensionMismatch { width: image.width, height: image.height })
}

fn to_png(image: &ImageBuffer) -> Result<Vec<u8>, EncodeError> {
    let buffer = to_rgb_image(image)?;
    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    Ok(out)
}

fn to_jpg(image: &ImageBuffer) -> Result<Vec<u8>, EncodeError> {
    let buffer = to_rgb_image(image)?;
    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut cursor, image::ImageFormat::Jpeg)
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    #[test]
    fn png_format_wraps_osc_444_with_code_1() {
        let image = ImageBuffer::filled(2, 2, Rgb::new(5, 5, 5));
        let sequence = encode(&image, JexerImageFormat::Png).unwrap();
        assert!(sequence.starts_with("\x1b]444;1;0;"));
        assert!(sequence.ends_with('\x07'));
    }

    #[test]
    fn rgb_format_carries_dimension_prefix() {
        let image = ImageBuffer::filled(7, 3, Rgb::new(1, 2, 3));
        let sequence = encode(&image, JexerImageFormat::Rgb).unwrap();
        assert!(sequence.starts_with("\x1b]444;0;0;[7;3;0;]"));
    }

    #[test]
    fn disabled_format_produces_no_sequence() {
        let image = ImageBuffer::filled(2, 2, Rgb::black());
        let sequence = encode(&image, JexerImageFormat::Disabled).unwrap();
        assert!(sequence.is_empty());
    }
}
