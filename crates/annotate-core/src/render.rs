//! Annotation page renderer
//!
//! Builds a brand-new single-page PDF with lopdf. The page carries the
//! annotation text in Helvetica, one text run per line, starting at a fixed
//! anchor near the top-left of the content area. When a signature image is
//! supplied it is drawn in a reserved box below the text.
//!
//! Output is deterministic: identical input produces identical bytes for a
//! given lopdf version.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use crate::encoding::encode_line;
use crate::error::RenderError;
use crate::signature::SignatureImage;

const FONT_RESOURCE: &str = "F1";
const SIGNATURE_RESOURCE: &str = "Sig1";

/// Page geometry and typography, in PDF points (1/72 inch)
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    /// Left edge of the text block
    pub origin_x: f32,
    /// Baseline of the first line
    pub origin_y: f32,
    /// Nothing is drawn below this height
    pub bottom_margin: f32,
    pub font_size: f32,
    /// Baseline-to-baseline distance
    pub leading: f32,
    /// Gap between the last text line and the signature box
    pub signature_gap: f32,
    pub signature_max_width: f32,
    pub signature_max_height: f32,
}

impl Default for PageLayout {
    /// A4 portrait with a 56pt margin
    fn default() -> Self {
        let font_size = 14.0;
        Self {
            width: 595.0,
            height: 842.0,
            origin_x: 56.0,
            origin_y: 842.0 - 56.0,
            bottom_margin: 56.0,
            font_size,
            leading: font_size * 1.2,
            signature_gap: 12.0,
            signature_max_width: 200.0,
            signature_max_height: 100.0,
        }
    }
}

impl PageLayout {
    /// Lower-left corner and size of the signature box for an image with the
    /// given aspect ratio, placed below `line_count` lines of text
    pub fn signature_rect(&self, line_count: usize, aspect_ratio: f32) -> (f32, f32, f32, f32) {
        let (mut w, mut h) = (self.signature_max_width, self.signature_max_width / aspect_ratio);
        if h > self.signature_max_height {
            h = self.signature_max_height;
            w = h * aspect_ratio;
        }
        // Top of the box sits one gap below the descender area of the last line
        let last_baseline = self.origin_y - self.leading * line_count.saturating_sub(1) as f32;
        let top = last_baseline - self.font_size * 0.3 - self.signature_gap;
        (self.origin_x, top - h, w, h)
    }

    /// Most text lines whose baselines stay above the bottom margin
    pub fn max_lines(&self) -> usize {
        ((self.origin_y - self.bottom_margin) / self.leading).floor() as usize + 1
    }
}

/// Stateless annotation page generator
#[derive(Debug, Clone, Default)]
pub struct AnnotationRenderer {
    layout: PageLayout,
}

impl AnnotationRenderer {
    /// Render `text` (and an optional PNG signature) onto a fresh page
    pub fn render(&self, text: &str, signature: Option<&[u8]>) -> Result<Vec<u8>, RenderError> {
        let lines = text
            .lines()
            .map(encode_line)
            .collect::<Result<Vec<_>, _>>()?;
        let signature = signature.map(SignatureImage::decode).transpose()?;

        if lines.len() > self.layout.max_lines() {
            return Err(RenderError::PageOverflow { lines: lines.len() });
        }
        if let Some(image) = &signature {
            let (_, y, _, _) = self.layout.signature_rect(lines.len(), image.aspect_ratio());
            if y < self.layout.bottom_margin {
                return Err(RenderError::PageOverflow { lines: lines.len() });
            }
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut resources = dictionary! {
            "Font" => dictionary! {
                FONT_RESOURCE => Object::Reference(font_id),
            },
        };

        let mut operations = self.text_operations(&lines);

        if let Some(image) = &signature {
            let image_id = image.embed(&mut doc)?;
            resources.set(
                "XObject",
                dictionary! {
                    SIGNATURE_RESOURCE => Object::Reference(image_id),
                },
            );
            operations.extend(self.image_operations(lines.len(), image.aspect_ratio()));
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(self.layout.width),
                Object::Real(self.layout.height),
            ],
            "Resources" => resources,
            "Contents" => Object::Reference(content_id),
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;

        tracing::debug!(
            lines = lines.len(),
            signature = signature.is_some(),
            bytes = buffer.len(),
            "Rendered annotation page"
        );

        Ok(buffer)
    }

    fn text_operations(&self, lines: &[Vec<u8>]) -> Vec<Operation> {
        if lines.is_empty() {
            return Vec::new();
        }

        let layout = &self.layout;
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::Real(layout.font_size)],
            ),
            Operation::new("TL", vec![Object::Real(layout.leading)]),
            Operation::new(
                "Td",
                vec![Object::Real(layout.origin_x), Object::Real(layout.origin_y)],
            ),
        ];

        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(line.clone(), StringFormat::Literal)],
            ));
        }

        ops.push(Operation::new("ET", vec![]));
        ops
    }

    fn image_operations(&self, line_count: usize, aspect_ratio: f32) -> Vec<Operation> {
        let (x, y, w, h) = self.layout.signature_rect(line_count, aspect_ratio);
        vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(w),
                    0.into(),
                    0.into(),
                    Object::Real(h),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(SIGNATURE_RESOURCE.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]
    }
}

/// Number of pages in a PDF
pub fn page_count(bytes: &[u8]) -> Result<usize, RenderError> {
    let doc = Document::load_mem(bytes).map_err(|e| RenderError::Pdf(e.to_string()))?;
    Ok(doc.get_pages().len())
}
