//! Message filtering and text normalization.
//!
//! Pure and deterministic: the same raw message always yields the same result,
//! with no I/O. Filtering removes everything that carries no training signal —
//! system/service messages, reactions (flagged or recognizable by their text),
//! and attachment placeholders with no accompanying text. Normalization
//! repairs encoded rich-text bodies, strips object-replacement characters,
//! collapses internal whitespace, and trims.

use crate::models::{CleanedMessage, RawMessage};

/// Marker preceding the plaintext payload inside an encoded rich-text body.
const RICH_TEXT_MARKER: &str = "NSString$V\"";

/// Object replacement character used as an inline attachment placeholder.
const ATTACHMENT_PLACEHOLDER: char = '\u{FFFC}';

/// Reaction phrases that sometimes arrive as plain text with the reaction
/// flag unset.
const REACTION_PREFIXES: &[&str] = &[
    "Liked",
    "Loved",
    "Laughed at",
    "Emphasized",
    "Disliked",
    "Questioned",
    "Reacted",
];

/// Filter and normalize one raw message. Returns `None` when the message is
/// not usable as training signal.
pub fn normalize(raw: &RawMessage) -> Option<CleanedMessage> {
    // Reactions are never training signal, even when they quote text.
    if raw.is_system || raw.is_reaction {
        return None;
    }

    let body = raw.raw_text.as_deref()?;
    let body = decode_rich_text(body);

    if is_reaction_text(&body) {
        return None;
    }

    let body = body.replace(ATTACHMENT_PLACEHOLDER, " ");
    let text = collapse_whitespace(&body);
    if text.is_empty() {
        return None;
    }

    Some(CleanedMessage {
        id: raw.id,
        conversation_id: raw.conversation_id.clone(),
        sender_id: raw.sender_id.clone(),
        is_from_self: raw.is_from_self,
        timestamp: raw.timestamp,
        text,
    })
}

/// Extract the plaintext payload from an encoded rich-text body. Bodies that
/// don't carry the marker pass through unchanged.
fn decode_rich_text(body: &str) -> String {
    if let Some(start) = body.find(RICH_TEXT_MARKER) {
        let after = start + RICH_TEXT_MARKER.len();
        if let Some(end) = body[after..].find('"') {
            return body[after..after + end].to_string();
        }
    }
    body.to_string()
}

fn is_reaction_text(body: &str) -> bool {
    let trimmed = body.trim_start();
    REACTION_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

fn collapse_whitespace(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: Option<&str>) -> RawMessage {
        RawMessage {
            id: 1,
            conversation_id: "C1".to_string(),
            sender_id: Some("+15551234".to_string()),
            is_from_self: false,
            timestamp: 1000,
            raw_text: text.map(|t| t.to_string()),
            is_attachment: false,
            is_system: false,
            is_reaction: false,
        }
    }

    #[test]
    fn test_plain_message_passes() {
        let cleaned = normalize(&raw(Some("hey, are you around?"))).unwrap();
        assert_eq!(cleaned.text, "hey, are you around?");
        assert_eq!(cleaned.conversation_id, "C1");
    }

    #[test]
    fn test_system_message_dropped() {
        let mut msg = raw(Some("You joined the group"));
        msg.is_system = true;
        assert!(normalize(&msg).is_none());
    }

    #[test]
    fn test_reaction_flag_dropped_even_with_quoted_text() {
        let mut msg = raw(Some("Loved \u{201C}ok\u{201D}"));
        msg.is_reaction = true;
        assert!(normalize(&msg).is_none());
    }

    #[test]
    fn test_reaction_prefix_dropped_without_flag() {
        assert!(normalize(&raw(Some("Laughed at \u{201C}see you there\u{201D}"))).is_none());
        assert!(normalize(&raw(Some("Emphasized an image"))).is_none());
    }

    #[test]
    fn test_no_body_dropped() {
        assert!(normalize(&raw(None)).is_none());
    }

    #[test]
    fn test_attachment_placeholder_only_dropped() {
        let mut msg = raw(Some("\u{FFFC}"));
        msg.is_attachment = true;
        assert!(normalize(&msg).is_none());
    }

    #[test]
    fn test_attachment_with_caption_kept() {
        let mut msg = raw(Some("\u{FFFC}check this out"));
        msg.is_attachment = true;
        let cleaned = normalize(&msg).unwrap();
        assert_eq!(cleaned.text, "check this out");
    }

    #[test]
    fn test_rich_text_body_decoded() {
        let body = "streamtyped@NSAttributedString NSString$V\"on my way\" junk";
        let cleaned = normalize(&raw(Some(body))).unwrap();
        assert_eq!(cleaned.text, "on my way");
    }

    #[test]
    fn test_whitespace_collapsed_and_trimmed() {
        let cleaned = normalize(&raw(Some("  so   much \n\n space\t here  "))).unwrap();
        assert_eq!(cleaned.text, "so much space here");
    }

    #[test]
    fn test_whitespace_only_dropped() {
        assert!(normalize(&raw(Some("   \n\t  "))).is_none());
    }

    #[test]
    fn test_deterministic() {
        let msg = raw(Some("same   input"));
        assert_eq!(normalize(&msg), normalize(&msg));
    }
}
