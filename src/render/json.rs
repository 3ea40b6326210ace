//! JSON rendering.

use serde::Serialize;

use crate::error::{Error, Result};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize a document (or a whole reconstruction) to JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Node, Paragraph, Section};

    fn document() -> Document {
        Document {
            sections: vec![Section {
                heading: None,
                nodes: vec![Node::Paragraph(Paragraph::with_text(1, "Hello"))],
            }],
            footnotes: Vec::new(),
            page_count: 1,
        }
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&document(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"type\": \"paragraph\""));
        assert!(json.contains("Hello"));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&document(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["page_count"], 1);
    }
}
