//! Conversation segmentation.
//!
//! Groups cleaned messages by conversation id and splits each group into
//! session units wherever the gap between consecutive timestamps exceeds the
//! configured threshold. Implemented as a pure fold over the sorted sequence —
//! no I/O, no external cursors — so segmentation is independently testable.
//!
//! Identical (sender, timestamp, text) triples within one conversation are
//! deduplicated before folding; ties on equal timestamps keep extraction
//! order (the sort is stable).

use std::collections::HashSet;

use crate::models::{CleanedMessage, Conversation};

/// Segment cleaned messages into conversation units.
///
/// Every retained message appears in exactly one unit; units are non-empty,
/// chronologically ordered, and contain no internal gap above
/// `gap_threshold_secs`.
pub fn segment(mut messages: Vec<CleanedMessage>, gap_threshold_secs: i64) -> Vec<Conversation> {
    messages.sort_by(|a, b| {
        a.conversation_id
            .cmp(&b.conversation_id)
            .then(a.timestamp.cmp(&b.timestamp))
    });

    let mut seen: HashSet<(String, Option<String>, i64, String)> = HashSet::new();
    let mut units: Vec<Conversation> = Vec::new();

    for msg in messages {
        let key = (
            msg.conversation_id.clone(),
            msg.sender_id.clone(),
            msg.timestamp,
            msg.text.clone(),
        );
        if !seen.insert(key) {
            continue;
        }

        let start_new = match units.last() {
            Some(unit) => {
                unit.conversation_id != msg.conversation_id
                    || msg.timestamp - unit.last_timestamp() > gap_threshold_secs
            }
            None => true,
        };

        if start_new {
            units.push(Conversation {
                conversation_id: msg.conversation_id.clone(),
                messages: vec![msg],
            });
        } else {
            units.last_mut().unwrap().messages.push(msg);
        }
    }

    units
}
