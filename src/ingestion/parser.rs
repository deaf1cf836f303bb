//! File format routing and text extraction
//!
//! Supported formats: plain text, Markdown, and PDF. Everything else is
//! rejected at the boundary as an invalid document.

use std::path::Path;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use crate::error::{Error, Result};

/// Recognized source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Markdown,
    Pdf,
}

impl SourceFormat {
    /// Route a filename to a format by extension, falling back to a MIME guess
    pub fn detect(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("txt") | Some("text") | Some("log") => return Ok(SourceFormat::Text),
            Some("md") | Some("markdown") => return Ok(SourceFormat::Markdown),
            Some("pdf") => return Ok(SourceFormat::Pdf),
            _ => {}
        }

        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        match mime.essence_str() {
            "text/plain" => Ok(SourceFormat::Text),
            "text/markdown" => Ok(SourceFormat::Markdown),
            "application/pdf" => Ok(SourceFormat::Pdf),
            other => Err(Error::invalid_document(format!(
                "unsupported file type for '{}' ({})",
                filename, other
            ))),
        }
    }

    /// Extract plain text from raw file bytes
    pub fn extract_text(&self, filename: &str, data: &[u8]) -> Result<String> {
        match self {
            SourceFormat::Text => Ok(String::from_utf8_lossy(data).into_owned()),
            SourceFormat::Markdown => {
                let source = String::from_utf8_lossy(data);
                Ok(markdown_to_text(&source))
            }
            SourceFormat::Pdf => pdf_extract::extract_text_from_mem(data).map_err(|e| {
                Error::invalid_document(format!("failed to parse PDF '{}': {}", filename, e))
            }),
        }
    }
}

/// Strip Markdown structure down to its text content
fn markdown_to_text(source: &str) -> String {
    let mut text = String::with_capacity(source.len());
    for event in Parser::new(source) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock) => text.push_str("\n\n"),
            Event::Start(Tag::Item) => text.push_str("- "),
            _ => {}
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_extension() {
        assert_eq!(SourceFormat::detect("notes.txt").unwrap(), SourceFormat::Text);
        assert_eq!(SourceFormat::detect("README.md").unwrap(), SourceFormat::Markdown);
        assert_eq!(SourceFormat::detect("paper.PDF").unwrap(), SourceFormat::Pdf);
    }

    #[test]
    fn rejects_unsupported_types() {
        assert!(matches!(
            SourceFormat::detect("image.png"),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(
            SourceFormat::detect("archive.zip"),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn markdown_is_stripped_to_text() {
        let md = "# Title\n\nSome *emphasis* and `code`.\n\n- first\n- second\n";
        let text = SourceFormat::Markdown.extract_text("a.md", md.as_bytes()).unwrap();
        assert!(text.contains("Title"));
        assert!(text.contains("Some emphasis and code."));
        assert!(text.contains("- first"));
        assert!(!text.contains('#'));
        assert!(!text.contains('*'));
    }

    #[test]
    fn plain_text_passes_through() {
        let text = SourceFormat::Text.extract_text("a.txt", b"hello\nworld").unwrap();
        assert_eq!(text, "hello\nworld");
    }
}
