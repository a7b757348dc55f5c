//! Content normalization: any accepted `content` shape becomes an ordered
//! list of `{type, text}` segments.

use serde_json::{json, Value};

use crate::request::MessageContent;

/// A normalized content segment. Only text segments carry meaning for the
/// upstream; other types are kept for reorder expansion and dropped at
/// transcoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub seg_type: Option<String>,
    pub text: Option<String>,
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            seg_type: Some("text".to_string()),
            text: Some(text.into()),
        }
    }

    pub fn is_text(&self) -> bool {
        self.seg_type.as_deref() == Some("text") && self.text.is_some()
    }
}

/// Maps content to segments: string → one text segment; part array → one
/// segment per part (text parts verbatim, others reduced to `{type, text?}`);
/// object with string `text` → one text segment; anything else → empty.
pub fn normalize_content_to_list(content: Option<&MessageContent>) -> Vec<Segment> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(s)) => vec![Segment::text(s.clone())],
        Some(MessageContent::Parts(parts)) => {
            let mut segments = Vec::new();
            for part in parts {
                let inferred_type = part
                    .part_type
                    .clone()
                    .or_else(|| part.text.is_some().then(|| "text".to_string()));
                match (&inferred_type, &part.text) {
                    (Some(t), Some(text)) if t.as_str() == "text" => {
                        segments.push(Segment::text(text.clone()))
                    }
                    (None, None) => {}
                    _ => segments.push(Segment {
                        seg_type: inferred_type,
                        text: part.text.clone(),
                    }),
                }
            }
            segments
        }
        Some(MessageContent::Other(value)) => match value.get("text").and_then(Value::as_str) {
            Some(text) => vec![Segment::text(text.to_string())],
            None => Vec::new(),
        },
    }
}

/// Concatenates the text of text segments in order.
pub fn segments_to_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter(|s| s.is_text())
        .filter_map(|s| s.text.as_deref())
        .collect()
}

/// Maps text segments to upstream tool-result items; non-text segments are
/// dropped.
pub fn segments_to_warp_results(segments: &[Segment]) -> Vec<Value> {
    segments
        .iter()
        .filter(|s| s.is_text())
        .filter_map(|s| s.text.as_deref())
        .map(|text| json!({"text": {"text": text}}))
        .collect()
}
