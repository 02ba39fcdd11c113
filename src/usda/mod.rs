//! Text format (`.usda`) reader and writer.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::sdf;

pub mod parser;
pub mod token;
mod writer;

pub use writer::write_layer;

/// Parsed contents of one usda document.
pub struct TextReader {
    identifier: String,
    real_path: Option<std::path::PathBuf>,
    content: parser::LayerContent,
}

impl TextReader {
    /// Read and parse a usda file. The layer identifier is the file path.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))?;

        let mut reader = Self::parse(path.display().to_string(), &text)?;
        reader.real_path = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Parse usda text held in memory.
    pub fn parse(identifier: impl Into<String>, text: &str) -> Result<Self> {
        let identifier = identifier.into();
        let mut parser = parser::Parser::new(text);

        let content = match parser.parse() {
            Ok(content) => content,
            Err(err) => {
                let err = match parser.last_error_highlight() {
                    Some(highlight) => err.context(format!("Parse error at {highlight}")),
                    None => err,
                };
                return Err(err.context(format!("Failed to parse USDA data from '{identifier}'")));
            }
        };

        Ok(Self {
            identifier,
            real_path: None,
            content,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn content(&self) -> &parser::LayerContent {
        &self.content
    }

    /// Turn the parsed document into a layer.
    pub fn into_layer(self) -> sdf::Layer {
        let parser::LayerContent {
            default_prim,
            metadata,
            prims,
            root_prims,
        } = self.content;

        let mut layer = sdf::Layer::from_parts(self.identifier, default_prim, metadata, prims, root_prims);
        if let Some(path) = self.real_path {
            layer.set_real_path(path);
        }
        layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_location() {
        let err = TextReader::parse("bad.usda", "#usda 1.0\ndef \"a\" {\n    double attr = oops\n}\n")
            .err()
            .expect("parse should fail");
        let message = format!("{err:#}");
        assert!(message.contains("bad.usda"));
        assert!(message.contains("line 3"));
    }

    #[test]
    fn into_layer_keeps_content() {
        let reader = TextReader::parse(
            "mem.usda",
            "#usda 1.0\n(\n    defaultPrim = \"A\"\n)\n\ndef \"A\" {\n    def \"B\" {\n    }\n}\n",
        )
        .unwrap();
        assert_eq!(reader.identifier(), "mem.usda");
        assert_eq!(reader.content().root_prims, ["A"]);

        let layer = reader.into_layer();
        assert_eq!(layer.identifier(), "mem.usda");
        assert_eq!(layer.default_prim(), Some("A"));
        assert!(layer.has_prim(&sdf::path("/A/B").unwrap()));
        assert_eq!(layer.revision(), 0);
        assert!(layer.real_path().is_none());
    }
}
