//! Tree builder: normalizes either export schema into an id-indexed arena of
//! [`MessageNode`]s with a parent→children index.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::models::{
    ChatGptConversation, ChatGptMessage, ClaudeConversation, ClaudeMessage, MessageNode,
    ParsedExport, Sender,
};

const DEFAULT_CLAUDE_NAME: &str = "Unnamed Chat";
const DEFAULT_CHATGPT_TITLE: &str = "Untitled Chat";
const ROLE_USER: &str = "user";
const SENDER_HUMAN: &str = "human";
const CONTENT_TYPE_TEXT: &str = "text";

/// Conversation graph for one export unit.
///
/// Nodes live in an arena addressed by index; `children[i]` lists the arena
/// indices whose parent is node `i`, in source encounter order. Roots are nodes
/// whose parent is null or not present in the arena.
#[derive(Debug, Clone)]
pub struct ConversationTree {
    pub chat_name: String,
    pub chat_id: String,
    nodes: Vec<MessageNode>,
    index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl ConversationTree {
    /// Build the arena and adjacency in one pass over `nodes`.
    /// Duplicate ids keep their first occurrence.
    pub fn from_nodes(chat_name: String, chat_id: String, nodes: Vec<MessageNode>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut arena = Vec::with_capacity(nodes.len());

        for node in nodes {
            if index.contains_key(&node.id) {
                debug!("Duplicate message id {} in {}, keeping first", node.id, chat_name);
                continue;
            }
            index.insert(node.id.clone(), arena.len());
            arena.push(node);
        }

        let mut children = vec![Vec::new(); arena.len()];
        let mut roots = Vec::new();
        for (idx, node) in arena.iter().enumerate() {
            match node.parent_id.as_ref().and_then(|p| index.get(p)) {
                Some(&parent_idx) => children[parent_idx].push(idx),
                None => roots.push(idx),
            }
        }

        Self { chat_name, chat_id, nodes: arena, index, children, roots }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &MessageNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[MessageNode] {
        &self.nodes
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }
}

/// Build one tree per conversation in the export
pub fn build_trees(export: &ParsedExport) -> Vec<ConversationTree> {
    match export {
        ParsedExport::ChatGpt(conversations) => {
            conversations.iter().map(build_chatgpt_tree).collect()
        }
        ParsedExport::Claude(conversations) => conversations.iter().map(build_claude_tree).collect(),
    }
}

pub fn build_claude_tree(conversation: &ClaudeConversation) -> ConversationTree {
    let chat_name = non_empty_or(conversation.name.as_deref(), DEFAULT_CLAUDE_NAME);
    let chat_id = conversation.uuid.clone().unwrap_or_default();

    let nodes = conversation
        .chat_messages
        .iter()
        .filter_map(|msg| claude_node(msg, &chat_name))
        .collect();

    ConversationTree::from_nodes(chat_name, chat_id, nodes)
}

fn claude_node(msg: &ClaudeMessage, chat_name: &str) -> Option<MessageNode> {
    let id = msg.uuid.as_deref().filter(|id| !id.is_empty())?;

    let Some(timestamp) = msg.created_at else {
        debug!("Dropping message {} in {}: missing or invalid timestamp", id, chat_name);
        return None;
    };

    let sender =
        if msg.sender.as_deref() == Some(SENDER_HUMAN) { Sender::Human } else { Sender::Assistant };

    let text = match msg.text.as_deref() {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => msg
            .content
            .iter()
            .filter(|c| c.content_type.as_deref() == Some(CONTENT_TYPE_TEXT))
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join(" "),
    };

    Some(MessageNode {
        id: id.to_string(),
        parent_id: msg.parent.clone().filter(|p| !p.is_empty()),
        sender,
        text,
        timestamp,
    })
}

pub fn build_chatgpt_tree(conversation: &ChatGptConversation) -> ConversationTree {
    let chat_name = non_empty_or(conversation.title.as_deref(), DEFAULT_CHATGPT_TITLE);
    let chat_id = conversation.id.clone().unwrap_or_default();

    let nodes = conversation
        .mapping
        .iter()
        .filter_map(|(node_id, node)| {
            let message = node.message.as_ref()?;
            chatgpt_node(node_id, node.parent.as_deref(), message, &chat_name)
        })
        .collect();

    ConversationTree::from_nodes(chat_name, chat_id, nodes)
}

fn chatgpt_node(
    node_id: &str,
    parent: Option<&str>,
    message: &ChatGptMessage,
    chat_name: &str,
) -> Option<MessageNode> {
    let Some(timestamp) = message.create_time else {
        debug!("Dropping node {} in {}: missing or invalid create_time", node_id, chat_name);
        return None;
    };

    let role = message.author.as_ref().and_then(|a| a.role.as_deref());
    let sender = if role == Some(ROLE_USER) { Sender::Human } else { Sender::Assistant };

    Some(MessageNode {
        id: node_id.to_string(),
        parent_id: parent.filter(|p| !p.is_empty()).map(str::to_string),
        sender,
        text: chatgpt_text(message.content.as_ref()),
        timestamp,
    })
}

/// Flatten ChatGPT content: `parts` are joined with a single space, a bare
/// string is used as-is, anything else is rendered as JSON.
fn chatgpt_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => match obj.get("parts") {
            Some(Value::Array(parts)) => parts.iter().map(part_text).collect::<Vec<_>>().join(" "),
            _ => Value::Object(obj.clone()).to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn part_text(part: &Value) -> String {
    match part {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default).to_string()
}
