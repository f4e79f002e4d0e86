//! Lenient parsing of model replies.
//!
//! Models are asked for a JSON object but routinely wrap it in prose or
//! code fences. We take the span from the first `{` to the last `}` and
//! read fields individually; anything missing or of the wrong type falls
//! back to empty. If no object can be read at all, the raw text becomes
//! the reasoning and the action fields stay empty.

use super::{Ballot, NightDecision, Speech};
use serde_json::{Map, Value};
use tracing::debug;

/// The span from the first `{` to the last `}`, if any.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let json = extract_json(text)?;
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "malformed structured response, falling back to free-form");
            None
        }
    }
}

/// A non-empty string field; `null`, blanks and non-strings are `None`.
fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("none"))
        .map(str::to_string)
}

fn text_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn parse_night_action(text: &str) -> NightDecision {
    match parse_object(text) {
        Some(map) => NightDecision {
            target: string_field(&map, "target"),
            reasoning: text_field(&map, "reasoning"),
        },
        None => NightDecision {
            target: None,
            reasoning: text.to_string(),
        },
    }
}

pub fn parse_speech(text: &str) -> Speech {
    match parse_object(text) {
        Some(map) => Speech {
            speech: text_field(&map, "speech"),
            suspicion: string_field(&map, "suspicion"),
            reasoning: text_field(&map, "reasoning"),
        },
        None => Speech {
            speech: String::new(),
            suspicion: None,
            reasoning: text.to_string(),
        },
    }
}

pub fn parse_ballot(text: &str) -> Ballot {
    match parse_object(text) {
        Some(map) => Ballot {
            vote: string_field(&map, "vote"),
            reasoning: text_field(&map, "reasoning"),
        },
        None => Ballot {
            vote: None,
            reasoning: text.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"vote": "Bob"}"#;
        assert_eq!(extract_json(text), Some(text));
    }

    #[test]
    fn test_extract_json_in_prose_and_fences() {
        let text = "Sure!\n```json\n{\"target\": \"Eve\", \"meta\": {\"x\": 1}}\n```\nDone.";
        assert_eq!(
            extract_json(text),
            Some(r#"{"target": "Eve", "meta": {"x": 1}}"#)
        );
    }

    #[test]
    fn test_extract_json_absent() {
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_night_action() {
        let decision = parse_night_action(r#"I think {"target": "Carol", "reasoning": "she is sharp"}"#);
        assert_eq!(decision.target.as_deref(), Some("Carol"));
        assert_eq!(decision.reasoning, "she is sharp");
    }

    #[test]
    fn test_malformed_json_becomes_reasoning() {
        let raw = r#"{"vote": "Bob",, }"#;
        let ballot = parse_ballot(raw);
        assert_eq!(ballot.vote, None);
        assert_eq!(ballot.reasoning, raw);
    }

    #[test]
    fn test_free_form_speech_has_empty_speech() {
        let raw = "I have a bad feeling about Dave.";
        let speech = parse_speech(raw);
        assert!(speech.speech.is_empty());
        assert_eq!(speech.suspicion, None);
        assert_eq!(speech.reasoning, raw);
    }

    #[test]
    fn test_field_level_defaults() {
        let speech = parse_speech(r#"{"speech": "Hello all", "suspicion": ["Bob"]}"#);
        assert_eq!(speech.speech, "Hello all");
        assert_eq!(speech.suspicion, None);
        assert!(speech.reasoning.is_empty());

        let ballot = parse_ballot(r#"{"vote": null, "reasoning": "undecided"}"#);
        assert_eq!(ballot.vote, None);
        assert_eq!(ballot.reasoning, "undecided");

        let ballot = parse_ballot(r#"{"vote": "  none "}"#);
        assert_eq!(ballot.vote, None);
    }

    #[test]
    fn test_non_object_json_is_free_form() {
        let decision = parse_night_action("{}");
        assert_eq!(decision.target, None);
        assert!(decision.reasoning.is_empty());

        let decision = parse_night_action("[1, 2]");
        assert_eq!(decision.reasoning, "[1, 2]");
    }
}
