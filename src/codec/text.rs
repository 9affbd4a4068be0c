//! Document text in relaxed Extended JSON.

use bson::{Bson, Document};

use crate::core::{CodecError, Result};

pub fn render_document(document: &Document, pretty: bool) -> Result<String> {
    let json = Bson::Document(document.clone()).into_relaxed_extjson();
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map_err(|e| CodecError::InvalidText(e.to_string()).into())
}

pub fn parse_document(text: &str) -> Result<Document> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CodecError::InvalidText(e.to_string()))?;
    match Bson::try_from(json).map_err(|e| CodecError::InvalidText(e.to_string()))? {
        Bson::Document(document) => Ok(document),
        other => Err(CodecError::NotADocument(format!("{:?}", other.element_type())).into()),
    }
}
