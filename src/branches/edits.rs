use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::models::FlatMessage;

/// Sibling gap above which the later sibling is treated as an edited resend
pub const EDIT_GAP_THRESHOLD_SECS: f64 = 60.0;

/// A fork whose later sibling looks like the result of the user editing a message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditBranch {
    pub chat_name: String,
    pub parent_message_id: String,
    pub original_message_id: String,
    pub edit_message_id: String,
    pub time_gap_secs: f64,
    /// The edited sibling followed by all of its descendants, depth-first
    pub branch_message_ids: Vec<String>,
}

/// Detect edit-induced forks across all chats.
///
/// Siblings sharing a parent are sorted by timestamp; every consecutive pair
/// more than [`EDIT_GAP_THRESHOLD_SECS`] apart yields one [`EditBranch`].
/// Read-only: the messages are not modified.
pub fn detect_edit_branches(messages: &[FlatMessage]) -> Vec<EditBranch> {
    let mut by_chat: BTreeMap<&str, Vec<&FlatMessage>> = BTreeMap::new();
    for msg in messages {
        by_chat.entry(msg.chat_name.as_str()).or_default().push(msg);
    }

    let mut edits = Vec::new();
    for (chat_name, chat_messages) in by_chat {
        edits.extend(detect_in_chat(chat_name, &chat_messages));
    }
    edits
}

fn detect_in_chat(chat_name: &str, messages: &[&FlatMessage]) -> Vec<EditBranch> {
    let mut children: HashMap<&str, Vec<&FlatMessage>> = HashMap::new();
    for msg in messages {
        if let Some(parent) = msg.parent_message_id.as_deref() {
            children.entry(parent).or_default().push(msg);
        }
    }

    let mut parents: Vec<&str> = children.keys().copied().collect();
    parents.sort_unstable();

    let mut edits = Vec::new();
    for parent in parents {
        let mut siblings = children[parent].clone();
        if siblings.len() < 2 {
            continue;
        }
        siblings.sort_by_key(|m| m.timestamp);

        for pair in siblings.windows(2) {
            let (earlier, later) = (pair[0], pair[1]);
            let gap = (later.timestamp - earlier.timestamp).num_milliseconds() as f64 / 1000.0;
            if gap > EDIT_GAP_THRESHOLD_SECS {
                edits.push(EditBranch {
                    chat_name: chat_name.to_string(),
                    parent_message_id: parent.to_string(),
                    original_message_id: earlier.message_id.clone(),
                    edit_message_id: later.message_id.clone(),
                    time_gap_secs: gap,
                    branch_message_ids: collect_descendants(later, &children),
                });
            }
        }
    }
    edits
}

/// Depth-first walk from `start` over the parent→children index
fn collect_descendants(
    start: &FlatMessage,
    children: &HashMap<&str, Vec<&FlatMessage>>,
) -> Vec<String> {
    let mut collected = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![start];

    while let Some(msg) = stack.pop() {
        if !seen.insert(msg.message_id.as_str()) {
            continue;
        }
        collected.push(msg.message_id.clone());
        if let Some(kids) = children.get(msg.message_id.as_str()) {
            // Reverse so the first child is visited first
            stack.extend(kids.iter().rev());
        }
    }

    collected
}
