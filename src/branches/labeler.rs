use std::collections::VecDeque;

use tracing::{info, warn};

use crate::error::{FormatError, TreeError};
use crate::models::{FlatMessage, ParsedExport};
use crate::parsers::{ConversationTree, build_trees};

/// Branch id given to every root
pub const ROOT_BRANCH_ID: &str = "0";

/// Id of the `index`-th child at a fork under `parent`
pub fn fork_branch_id(parent: &str, index: usize) -> String {
    format!("{}.{}", parent, index)
}

/// Assign dotted branch ids to every message of a conversation.
///
/// Breadth-first from each root (seeded with `"0"`) over an explicit worklist.
/// A node with a single child passes its id through unchanged; a node with
/// `k > 1` children gives child `i` the id `{parent}.{i}`.
///
/// # Errors
///
/// Returns [`TreeError::CycleDetected`] if a node is reached twice or if any
/// node is unreachable from every root (its parent chain loops).
pub fn label_branches(tree: &ConversationTree) -> Result<Vec<FlatMessage>, TreeError> {
    let mut visited = vec![false; tree.len()];
    let mut messages = Vec::with_capacity(tree.len());
    let mut worklist: VecDeque<(usize, String)> = VecDeque::new();

    for &root in tree.roots() {
        worklist.push_back((root, ROOT_BRANCH_ID.to_string()));

        while let Some((idx, branch_id)) = worklist.pop_front() {
            if visited[idx] {
                return Err(cycle(tree, idx));
            }
            visited[idx] = true;

            let children = tree.children(idx);
            match children {
                [] => {}
                [only] => worklist.push_back((*only, branch_id.clone())),
                many => {
                    for (k, &child) in many.iter().enumerate() {
                        worklist.push_back((child, fork_branch_id(&branch_id, k)));
                    }
                }
            }

            messages.push(flatten(tree, idx, branch_id));
        }
    }

    if let Some(unreached) = visited.iter().position(|seen| !seen) {
        return Err(cycle(tree, unreached));
    }

    Ok(messages)
}

fn flatten(tree: &ConversationTree, idx: usize, branch_id: String) -> FlatMessage {
    let node = tree.node(idx);
    FlatMessage {
        chat_name: tree.chat_name.clone(),
        chat_id: tree.chat_id.clone(),
        message_id: node.id.clone(),
        parent_message_id: node.parent_id.clone(),
        branch_id,
        sender: node.sender,
        timestamp: node.timestamp,
        text: node.text.clone(),
    }
}

fn cycle(tree: &ConversationTree, idx: usize) -> TreeError {
    TreeError::CycleDetected {
        conversation: tree.chat_name.clone(),
        message_id: tree.node(idx).id.clone(),
    }
}

/// Flattened messages of a whole export
#[derive(Debug, Clone, Default)]
pub struct Linearized {
    pub messages: Vec<FlatMessage>,
    pub conversations: usize,
    pub skipped: Vec<TreeError>,
}

/// Build and label every conversation of an export.
///
/// Conversations with cyclic parent graphs are logged and skipped.
///
/// # Errors
///
/// Returns [`FormatError::TooManyInvalid`] if more than half of the
/// conversations could not be labeled, which indicates a systematically broken
/// export rather than a few corrupted chats.
pub fn linearize(export: &ParsedExport) -> Result<Linearized, FormatError> {
    let trees = build_trees(export);
    let mut result = Linearized { conversations: trees.len(), ..Default::default() };

    for tree in &trees {
        match label_branches(tree) {
            Ok(messages) => result.messages.extend(messages),
            Err(e) => {
                warn!("Skipping conversation: {}", e);
                result.skipped.push(e);
            }
        }
    }

    let total = result.conversations;
    let failed = result.skipped.len();
    FormatError::check_failure_rate(failed, total)?;

    info!(
        "Linearized {} messages from {} conversations ({} skipped)",
        result.messages.len(),
        total,
        failed
    );

    Ok(result)
}
