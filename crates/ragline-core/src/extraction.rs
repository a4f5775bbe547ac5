//! Structured information extracted from a document by a language model,
//! and the lenient parsers for the model's replies.
//!
//! Model output is treated as untrusted text: a reply that does not contain
//! a parseable JSON array yields an empty list rather than an error.

use serde::{Deserialize, Serialize};

/// Maximum number of key points kept from a reply.
pub const MAX_KEY_POINTS: usize = 7;
/// Lines this short or shorter are not treated as key points.
const MIN_KEY_POINT_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_file: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Slice from the first `[` to the last `]`, if both exist in that order.
fn json_array_slice(reply: &str) -> Option<&str> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    (end > start).then(|| &reply[start..=end])
}

fn parse_json_array<T: serde::de::DeserializeOwned>(reply: &str, what: &str) -> Vec<T> {
    let Some(slice) = json_array_slice(reply) else {
        tracing::warn!("model reply for {} contained no JSON array", what);
        return Vec::new();
    };
    match serde_json::from_str(slice) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("could not parse {} from model reply: {}", what, e);
            Vec::new()
        }
    }
}

pub fn parse_entities(reply: &str) -> Vec<Entity> {
    parse_json_array(reply, "entities")
}

pub fn parse_keywords(reply: &str) -> Vec<Keyword> {
    parse_json_array(reply, "keywords")
}

/// One point per line, with leading numbering and bullets stripped.
pub fn parse_key_points(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || ".-•* ".contains(c))
        })
        .filter(|line| line.chars().count() > MIN_KEY_POINT_CHARS)
        .take(MAX_KEY_POINTS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities_with_surrounding_prose() {
        let reply = r#"Sure! Here they are:
[{"text": "Ada Lovelace", "type": "person"}, {"text": "London", "type": "location"}]
Hope this helps."#;
        let entities = parse_entities(reply);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].text, "Ada Lovelace");
        assert_eq!(entities[1].kind, "location");
        assert_eq!(entities[1].confidence, None);
    }

    #[test]
    fn test_malformed_reply_yields_empty() {
        assert!(parse_entities("no json here").is_empty());
        assert!(parse_entities("] backwards [").is_empty());
        assert!(parse_keywords(r#"[{"txt": "missing field"}]"#).is_empty());
        assert!(parse_keywords("[not valid json]").is_empty());
    }

    #[test]
    fn test_parse_keywords() {
        let keywords = parse_keywords(r#"[{"text": "vector search"}, {"text": "embeddings"}]"#);
        let texts: Vec<_> = keywords.iter().map(|k| k.text.as_str()).collect();
        assert_eq!(texts, vec!["vector search", "embeddings"]);
    }

    #[test]
    fn test_parse_key_points() {
        let reply = "1. Revenue grew twelve percent year over year\n\
                     - Costs were flat\n\
                     • Headcount increased in the platform team\n\
                     \n\
                     * Short\n";
        assert_eq!(
            parse_key_points(reply),
            vec![
                "Revenue grew twelve percent year over year",
                "Costs were flat",
                "Headcount increased in the platform team",
            ]
        );
    }

    #[test]
    fn test_key_points_capped() {
        let reply = (0..12)
            .map(|i| format!("Point number {} is important", i))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(parse_key_points(&reply).len(), MAX_KEY_POINTS);
    }

    #[test]
    fn test_entity_serializes_type_field() {
        let entity = Entity {
            text: "Rust".into(),
            kind: "language".into(),
            confidence: None,
        };
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, r#"{"text":"Rust","type":"language"}"#);
    }
}
