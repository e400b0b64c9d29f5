//! Signature image decoding and embedding
//!
//! PNG input is flattened to 8-bit DeviceRGB samples with an optional
//! DeviceGray soft mask, deflated, and added to the document as an Image
//! XObject.

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::RenderError;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Decoded signature raster
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    /// Packed RGB, 3 bytes per pixel
    pub rgb: Vec<u8>,
    /// One byte per pixel; `None` when the image is fully opaque
    pub alpha: Option<Vec<u8>>,
}

impl SignatureImage {
    /// Decode PNG bytes. Other formats are rejected with
    /// [`RenderError::UnsupportedImage`].
    pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
        if !bytes.starts_with(PNG_MAGIC) {
            return Err(RenderError::UnsupportedImage);
        }

        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| RenderError::Image(e.to_string()))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| RenderError::Image(e.to_string()))?;
        let samples = &buf[..info.buffer_size()];

        let pixels = info.width as usize * info.height as usize;
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);

        match info.color_type {
            png::ColorType::Rgb => rgb.extend_from_slice(samples),
            png::ColorType::Rgba => {
                for px in samples.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                    alpha.push(px[3]);
                }
            }
            png::ColorType::Grayscale => {
                for &v in samples {
                    rgb.extend_from_slice(&[v, v, v]);
                }
            }
            png::ColorType::GrayscaleAlpha => {
                for px in samples.chunks_exact(2) {
                    rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                    alpha.push(px[1]);
                }
            }
            // EXPAND turns palette images into RGB(A)
            png::ColorType::Indexed => {
                return Err(RenderError::Image("palette was not expanded".into()));
            }
        }

        let alpha = if alpha.iter().any(|&a| a != u8::MAX) {
            Some(alpha)
        } else {
            None
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            rgb,
            alpha,
        })
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Add the image (and its soft mask) to `doc`, returning the XObject id
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId, RenderError> {
        let smask_id = match &self.alpha {
            Some(alpha) => {
                let dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => self.width as i64,
                    "Height" => self.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                };
                Some(doc.add_object(Stream::new(dict, deflate(alpha)?)))
            }
            None => None,
        };

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        if let Some(id) = smask_id {
            dict.set("SMask", Object::Reference(id));
        }

        Ok(doc.add_object(Stream::new(dict, deflate(&self.rgb)?)))
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| RenderError::Image(e.to_string()))?;
    encoder.finish().map_err(|e| RenderError::Image(e.to_string()))
}
