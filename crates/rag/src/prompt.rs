//! Prompt assembly for retrieval-augmented turns.

use rag_core::HistoryMessage;

use crate::citation::{FormattedCitation, PersistedCitation};

/// Metadata keys checked, in order, for a human-readable source label.
const LABEL_KEYS: &[&str] = &["fileName", "file_name", "source", "title"];

/// Tag marking a citation's origin.
pub fn source_tag(citation: &FormattedCitation) -> &'static str {
    if citation.document.is_admin_kb {
        "[ADMIN]"
    } else {
        "[USER]"
    }
}

/// Label shown to the model for a citation.
///
/// Uses the first non-empty label found in the metadata, otherwise a
/// position-based fallback.
pub fn file_label(citation: &FormattedCitation, index: usize) -> String {
    LABEL_KEYS
        .iter()
        .filter_map(|key| citation.document.metadata.get(*key))
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .find(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("document-{}", index))
}

/// Render persisted citations as indexed context blocks, in rank order.
///
/// Indices start at 1 and match the display index of each citation.
pub fn build_context(citations: &[PersistedCitation]) -> String {
    let mut context = String::new();

    for (i, persisted) in citations.iter().enumerate() {
        let index = i + 1;
        let citation = &persisted.citation;
        context.push_str(&format!(
            "[{}]. {} file name: {}\nfile id: {}\n{}\n\n",
            index,
            source_tag(citation),
            file_label(citation, index),
            persisted.id,
            citation.document.page_content.trim(),
        ));
    }

    context
}

/// Wrap the retrieved context and the question into one instruction.
pub fn augment_user_message(question: &str, context: &str) -> String {
    format!(
        r#"You are answering a question using only the content below.

Rules:
- Answer only from the content between the CONTENT markers.
- If the content does not support an answer, say "I don't know".
- Sources tagged [ADMIN] take priority over sources tagged [USER] when they disagree.
- Always end your answer with a citation marker listing the file ids you used, in this form:
{{% citation items=[{{name:"<file name>",id:"<file id>"}}] /%}}
  Use an empty list when no content was used.

----------------
CONTENT START
{context}CONTENT END
----------------

Question: {question}"#,
        context = context,
        question = question.trim(),
    )
}

/// Build the full message list: persona, history verbatim, augmented turn.
pub fn build_messages(
    persona: &str,
    history: &[HistoryMessage],
    augmented: String,
) -> Vec<HistoryMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(HistoryMessage::system(persona));
    messages.extend(history.iter().cloned());
    messages.push(HistoryMessage::user(augmented));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::CitationDocument;
    use rag_core::ChatRole;
    use serde_json::json;

    fn persisted(id: &str, admin: bool, metadata: serde_json::Value) -> PersistedCitation {
        PersistedCitation {
            id: id.to_string(),
            citation: FormattedCitation {
                score: 0.5,
                document: CitationDocument {
                    id: String::new(),
                    user_id: String::new(),
                    page_content: format!("content of {}", id),
                    metadata,
                    chat_thread_id: None,
                    is_admin_kb: admin,
                },
            },
        }
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_context_tags_and_order() {
        let context = build_context(&[
            persisted("c-admin", true, json!({"fileName": "policy.pdf"})),
            persisted("c-user", false, json!({})),
        ]);

        let admin_entry =
            "[1]. [ADMIN] file name: policy.pdf\nfile id: c-admin\ncontent of c-admin";
        let user_entry = "[2]. [USER] file name: document-2\nfile id: c-user\ncontent of c-user";
        assert!(context.starts_with(admin_entry));
        assert!(context.contains(user_entry));
        assert!(context.find("[ADMIN]").unwrap() < context.find("[USER]").unwrap());
    }

    #[test]
    fn test_file_label_prefers_metadata() {
        let c = persisted("c", false, json!({"source": "  ", "title": "Handbook"}));
        assert_eq!(file_label(&c.citation, 3), "Handbook");
    }

    #[test]
    fn test_augmented_message_contains_rules() {
        let message = augment_user_message("  what is x? ", "");
        assert!(message.contains("I don't know"));
        assert!(message.contains("[ADMIN]"));
        assert!(message.contains(r#"{% citation items=[{name:"<file name>",id:"<file id>"}] /%}"#));
        assert!(message.ends_with("Question: what is x?"));
        assert!(message.contains("CONTENT START\nCONTENT END"));
    }

    #[test]
    fn test_build_messages_keeps_history_verbatim() {
        let history = vec![
            HistoryMessage::user("first"),
            HistoryMessage::assistant("reply"),
        ];
        let messages = build_messages("persona", &history, "augmented".to_string());

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, "persona");
        assert_eq!(&messages[1..3], &history[..]);
        assert_eq!(messages[3].role, ChatRole::User);
        assert_eq!(messages[3].content, "augmented");
    }
}
