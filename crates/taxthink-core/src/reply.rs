use serde::{Deserialize, Serialize};

/// Substituted when the generator omits `content` from its reply.
pub const FALLBACK_CONTENT: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

/// Substituted when the generator omits `thinkingMode` from its reply.
pub const DEFAULT_THINKING_MODE: &str = "General Tax Analysis";

/// A fully-populated assistant turn: prose plus the structured fields the
/// generator is instructed to return alongside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredReply {
    pub content: String,
    pub thinking_mode: String,
    pub categories: Vec<String>,
    pub action_items: Vec<String>,
    pub key_insights: Vec<String>,
    pub next_questions: Vec<String>,
}

/// Loose mirror of the generator's JSON contract. Every field is optional;
/// unknown keys are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    thinking_mode: Option<String>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    action_items: Option<Vec<String>>,
    #[serde(default)]
    key_insights: Option<Vec<String>>,
    #[serde(default)]
    next_questions: Option<Vec<String>>,
}

impl StructuredReply {
    /// Parse raw generator output, substituting the documented default for
    /// every absent field. Errs only when the text is not a JSON object.
    pub fn from_model_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: RawReply = serde_json::from_str(raw)?;
        Ok(Self {
            content: parsed.content.unwrap_or_else(|| FALLBACK_CONTENT.to_string()),
            thinking_mode: parsed
                .thinking_mode
                .unwrap_or_else(|| DEFAULT_THINKING_MODE.to_string()),
            categories: parsed.categories.unwrap_or_default(),
            action_items: parsed.action_items.unwrap_or_default(),
            key_insights: parsed.key_insights.unwrap_or_default(),
            next_questions: parsed.next_questions.unwrap_or_default(),
        })
    }
}

/// Structured fields persisted alongside an assistant message.
///
/// Reads are lenient: absent fields fall back to their defaults and unknown
/// keys are dropped, so rows written by older or newer builds still decode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default)]
    pub thinking_mode: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    /// Absent on welcome messages; present on generated turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_questions: Option<Vec<String>>,
}

impl MessageMetadata {
    /// Metadata for a generated assistant turn, follow-up questions included.
    pub fn from_reply(reply: &StructuredReply) -> Self {
        Self {
            thinking_mode: reply.thinking_mode.clone(),
            categories: reply.categories.clone(),
            action_items: reply.action_items.clone(),
            key_insights: reply.key_insights.clone(),
            next_questions: Some(reply.next_questions.clone()),
        }
    }

    /// Metadata for the persisted welcome turn, which omits follow-up
    /// questions.
    pub fn from_welcome_reply(reply: &StructuredReply) -> Self {
        Self {
            thinking_mode: reply.thinking_mode.clone(),
            categories: reply.categories.clone(),
            action_items: reply.action_items.clone(),
            key_insights: reply.key_insights.clone(),
            next_questions: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_reply_parses_verbatim() {
        let raw = r#"{
            "content": "Deduct your home office.",
            "thinkingMode": "Business Tax Optimization",
            "categories": ["deductions"],
            "actionItems": ["Measure the office"],
            "keyInsights": ["Home office qualifies"],
            "nextQuestions": ["Do you rent or own?"]
        }"#;
        let reply = StructuredReply::from_model_json(raw).unwrap();
        assert_eq!(reply.content, "Deduct your home office.");
        assert_eq!(reply.thinking_mode, "Business Tax Optimization");
        assert_eq!(reply.categories, vec!["deductions"]);
        assert_eq!(reply.action_items, vec!["Measure the office"]);
        assert_eq!(reply.key_insights, vec!["Home office qualifies"]);
        assert_eq!(reply.next_questions, vec!["Do you rent or own?"]);
    }

    #[test]
    fn empty_object_yields_documented_defaults() {
        let reply = StructuredReply::from_model_json("{}").unwrap();
        assert_eq!(reply.content, FALLBACK_CONTENT);
        assert_eq!(reply.thinking_mode, DEFAULT_THINKING_MODE);
        assert!(reply.categories.is_empty());
        assert!(reply.action_items.is_empty());
        assert!(reply.key_insights.is_empty());
        assert!(reply.next_questions.is_empty());
    }

    #[test]
    fn partial_reply_fills_only_missing_fields() {
        let reply =
            StructuredReply::from_model_json(r#"{"content": "hi", "categories": ["setup"]}"#)
                .unwrap();
        assert_eq!(reply.content, "hi");
        assert_eq!(reply.categories, vec!["setup"]);
        assert_eq!(reply.thinking_mode, DEFAULT_THINKING_MODE);
        assert!(reply.next_questions.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let reply = StructuredReply::from_model_json(
            r#"{"content": "hi", "confidence": 0.9, "extra": {"a": 1}}"#,
        )
        .unwrap();
        assert_eq!(reply.content, "hi");
    }

    #[test]
    fn non_object_input_is_an_error() {
        assert!(StructuredReply::from_model_json("not json at all").is_err());
        assert!(StructuredReply::from_model_json("[1, 2]").is_err());
        assert!(StructuredReply::from_model_json("").is_err());
    }

    #[test]
    fn reply_serializes_camel_case() {
        let reply = StructuredReply::from_model_json("{}").unwrap();
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("thinkingMode").is_some());
        assert!(json.get("actionItems").is_some());
        assert!(json.get("keyInsights").is_some());
        assert!(json.get("nextQuestions").is_some());
        assert!(json.get("thinking_mode").is_none());
    }

    #[test]
    fn welcome_metadata_omits_next_questions() {
        let reply = StructuredReply {
            content: "welcome".into(),
            thinking_mode: "Welcome & Setup".into(),
            categories: vec!["setup".into()],
            action_items: vec!["Describe your situation".into()],
            key_insights: vec!["Configured".into()],
            next_questions: vec!["What area?".into()],
        };
        let meta = MessageMetadata::from_welcome_reply(&reply);
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("nextQuestions").is_none());

        let full = MessageMetadata::from_reply(&reply);
        let json = serde_json::to_value(&full).unwrap();
        assert_eq!(json["nextQuestions"][0], "What area?");
    }

    #[test]
    fn metadata_reads_are_lenient() {
        let meta: MessageMetadata =
            serde_json::from_str(r#"{"thinkingMode": "Welcome & Setup", "future": true}"#).unwrap();
        assert_eq!(meta.thinking_mode, "Welcome & Setup");
        assert!(meta.categories.is_empty());
        assert!(meta.next_questions.is_none());
    }
}
