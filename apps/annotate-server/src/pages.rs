//! HTML pages
//!
//! Templates are read once at startup. A file missing from the template
//! directory falls back to the copy compiled into the binary. Placeholders
//! look like `{{name}}`; callers pass values that are already HTML-safe.

use std::path::Path;

use annotate_core::{DocumentSummary, Preview};

const INDEX_TEMPLATE: &str = "index.html";
const EDIT_TEMPLATE: &str = "edit.html";

const DEFAULT_INDEX: &str = include_str!("../templates/index.html");
const DEFAULT_EDIT: &str = include_str!("../templates/edit.html");

/// Parsed page templates
#[derive(Debug, Clone)]
pub struct Templates {
    index: String,
    edit: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            edit: DEFAULT_EDIT.to_string(),
        }
    }
}

impl Templates {
    /// Load templates from `dir`, using built-in pages for missing files
    pub fn load(dir: &Path) -> std::io::Result<Self> {
        Ok(Self {
            index: load_or_default(dir, INDEX_TEMPLATE, DEFAULT_INDEX)?,
            edit: load_or_default(dir, EDIT_TEMPLATE, DEFAULT_EDIT)?,
        })
    }

    /// Landing page with the upload form and previously uploaded documents
    pub fn index_page(&self, documents: &[DocumentSummary]) -> String {
        let listing = if documents.is_empty() {
            "<p class=\"empty\">No documents uploaded yet.</p>".to_string()
        } else {
            let items: String = documents
                .iter()
                .map(|doc| {
                    let name = doc.filename.as_str();
                    let download = if doc.has_output {
                        format!(
                            " &middot; <a href=\"{}\">download annotated</a>",
                            escape_html(&route("download", name))
                        )
                    } else {
                        String::new()
                    };
                    format!(
                        "<li><a href=\"{}\">{}</a>{}</li>\n",
                        escape_html(&route("edit", name)),
                        escape_html(name),
                        download
                    )
                })
                .collect();
            format!("<ul class=\"documents\">\n{}</ul>", items)
        };

        fill(&self.index, &[("documents", listing.as_str())])
    }

    /// Edit view: embedded preview of the original plus the annotation form
    pub fn edit_page(&self, preview: &Preview) -> String {
        let name = preview.filename.as_str();
        fill(
            &self.edit,
            &[
                ("filename", escape_html(name).as_str()),
                ("save_url", escape_html(&route("save", name)).as_str()),
                // Base64 alphabet needs no escaping
                ("pdf_base64", preview.pdf_base64.as_str()),
                ("size_bytes", preview.size_bytes.to_string().as_str()),
                ("sha256", preview.sha256.as_str()),
            ],
        )
    }
}

/// `/{action}/{percent-encoded filename}`
pub fn route(action: &str, filename: &str) -> String {
    format!("/{}/{}", action, urlencoding::encode(filename))
}

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn load_or_default(dir: &Path, name: &str, fallback: &str) -> std::io::Result<String> {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(source) => {
            tracing::debug!(template = %path.display(), "Loaded template");
            Ok(source)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(template = name, "Using built-in template");
            Ok(fallback.to_string())
        }
        Err(e) => Err(e),
    }
}

/// Substitute `{{key}}` placeholders in one left-to-right pass. Inserted
/// values are never rescanned; unknown placeholders are kept verbatim.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };

        let name = &after[..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}
