/// Edge case integration tests
///
/// These tests cover malformed exports, broken message graphs, and other unusual scenarios
mod common;

use std::fs;

use chat_atlas::error::FormatError;
use chat_atlas::models::ExportFormat;
use chat_atlas::{detect_edit_branches, linearize, load_export};
use common::{ChatGptConversationBuilder, ClaudeConversationBuilder, Workspace};
use serde_json::json;

#[test]
fn test_edge_case_empty_array_is_unknown_format() {
    let workspace = Workspace::new();
    let path = workspace.export("empty.json", &[]);

    let result = load_export(&path);
    assert!(matches!(result, Err(FormatError::UnknownFormat(_))), "Empty exports carry no schema marker");
}

#[test]
fn test_edge_case_non_array_payload() {
    let workspace = Workspace::new();
    let path = workspace.path().join("object.json");
    fs::write(&path, r#"{"chat_messages": []}"#).unwrap();

    let result = load_export(&path);
    assert!(matches!(result, Err(FormatError::UnknownFormat(_))));
}

#[test]
fn test_edge_case_first_element_decides_schema() {
    // A ChatGPT element after a Claude element is decoded with the Claude schema
    let workspace = Workspace::new();
    let path = workspace.export(
        "mixed.json",
        &[
            ClaudeConversationBuilder::new("Claude chat").exchange("c", "2024-01-01T00:00:00Z", 2).to_json(),
            ChatGptConversationBuilder::new("GPT chat").node("g", None, "user", "hi", 1_704_067_200.0).to_json(),
        ],
    );

    let parsed = load_export(&path).unwrap();
    assert_eq!(parsed.format(), ExportFormat::Claude);
    assert_eq!(parsed.len(), 2);

    let linearized = linearize(&parsed).unwrap();
    assert_eq!(linearized.messages.len(), 2);
    assert!(linearized.messages.iter().all(|m| m.chat_name == "Claude chat"));
}

#[test]
fn test_edge_case_messages_without_timestamps_are_dropped() {
    let workspace = Workspace::new();
    let mut conversation = ClaudeConversationBuilder::new("Partial")
        .message("m1", None, "human", "kept", "2024-02-01T00:00:00Z")
        .to_json();
    conversation["chat_messages"].as_array_mut().unwrap().push(json!({
        "uuid": "m2",
        "parent": "m1",
        "sender": "assistant",
        "text": "no timestamp",
    }));
    conversation["chat_messages"].as_array_mut().unwrap().push(json!({
        "uuid": "m3",
        "parent": "m1",
        "sender": "assistant",
        "text": "bad timestamp",
        "created_at": "yesterday",
    }));
    let path = workspace.export("claude.json", &[conversation]);

    let linearized = linearize(&load_export(&path).unwrap()).unwrap();
    let ids: Vec<&str> = linearized.messages.iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, vec!["m1"]);
}

#[test]
fn test_edge_case_orphaned_parent_becomes_root() {
    let workspace = Workspace::new();
    let path = workspace.export(
        "claude.json",
        &[ClaudeConversationBuilder::new("Orphan")
            .message("child", Some("deleted-parent"), "human", "still here", "2024-02-01T00:00:00Z")
            .to_json()],
    );

    let linearized = linearize(&load_export(&path).unwrap()).unwrap();
    assert_eq!(linearized.messages.len(), 1);
    assert_eq!(linearized.messages[0].branch_id, "0");
}

#[test]
fn test_edge_case_cyclic_conversation_is_skipped() {
    let workspace = Workspace::new();
    let path = workspace.export(
        "claude.json",
        &[
            ClaudeConversationBuilder::new("Loop")
                .message("x", Some("y"), "human", "x", "2024-01-01T00:00:00Z")
                .message("y", Some("x"), "assistant", "y", "2024-01-01T00:00:01Z")
                .to_json(),
            ClaudeConversationBuilder::new("Fine one").exchange("a", "2024-01-02T00:00:00Z", 2).to_json(),
            ClaudeConversationBuilder::new("Fine two").exchange("b", "2024-01-03T00:00:00Z", 2).to_json(),
        ],
    );

    let linearized = linearize(&load_export(&path).unwrap()).unwrap();
    assert_eq!(linearized.conversations, 3);
    assert_eq!(linearized.skipped.len(), 1);
    assert_eq!(linearized.messages.len(), 4);
    assert!(linearized.messages.iter().all(|m| m.chat_name != "Loop"));
}

#[test]
fn test_edge_case_mostly_cyclic_export_is_rejected() {
    let workspace = Workspace::new();
    let cyclic = |name: &str| {
        ClaudeConversationBuilder::new(name)
            .message("x", Some("y"), "human", "x", "2024-01-01T00:00:00Z")
            .message("y", Some("x"), "assistant", "y", "2024-01-01T00:00:01Z")
            .to_json()
    };
    let path = workspace.export(
        "claude.json",
        &[
            cyclic("Loop one"),
            cyclic("Loop two"),
            ClaudeConversationBuilder::new("Fine").exchange("a", "2024-01-02T00:00:00Z", 2).to_json(),
        ],
    );

    let result = linearize(&load_export(&path).unwrap());
    assert!(matches!(result, Err(FormatError::TooManyInvalid { failed: 2, total: 3 })));
}

#[test]
fn test_edge_case_missing_names_use_defaults() {
    let workspace = Workspace::new();
    let claude = workspace.export(
        "claude.json",
        &[json!({"chat_messages": [
            {"uuid": "m", "sender": "human", "text": "hi", "created_at": "2024-01-01T00:00:00Z"}
        ]})],
    );
    let chatgpt = workspace.export(
        "chatgpt.json",
        &[json!({"title": "   ", "mapping": {
            "n": {"parent": null, "message": {"author": {"role": "user"}, "content": {"parts": ["hi"]}, "create_time": 1704067200}}
        }})],
    );

    let claude = linearize(&load_export(&claude).unwrap()).unwrap();
    assert_eq!(claude.messages[0].chat_name, "Unnamed Chat");

    let chatgpt = linearize(&load_export(&chatgpt).unwrap()).unwrap();
    assert_eq!(chatgpt.messages[0].chat_name, "Untitled Chat");
    assert_eq!(chatgpt.messages[0].text, "hi");
}

#[test]
fn test_edge_case_chatgpt_nodes_without_message_are_skipped() {
    // Export roots are often bare structural nodes
    let workspace = Workspace::new();
    let path = workspace.export(
        "chatgpt.json",
        &[json!({"title": "Structure", "mapping": {
            "client-root": {"parent": null, "message": null},
            "u": {"parent": "client-root", "message": {"author": {"role": "user"}, "content": {"parts": ["a", "b"]}, "create_time": 1704067200.5}}
        }})],
    );

    let linearized = linearize(&load_export(&path).unwrap()).unwrap();
    assert_eq!(linearized.messages.len(), 1);
    assert_eq!(linearized.messages[0].message_id, "u");
    assert_eq!(linearized.messages[0].branch_id, "0");
    assert_eq!(linearized.messages[0].text, "a b");
}

#[test]
fn test_edge_case_quick_regeneration_is_not_an_edit() {
    let workspace = Workspace::new();
    let path = workspace.export(
        "claude.json",
        &[ClaudeConversationBuilder::new("Regenerate")
            .message("q", None, "human", "question", "2024-01-01T00:00:00Z")
            .message("a1", Some("q"), "assistant", "answer", "2024-01-01T00:00:10Z")
            .message("a2", Some("q"), "assistant", "answer again", "2024-01-01T00:00:40Z")
            .to_json()],
    );

    let linearized = linearize(&load_export(&path).unwrap()).unwrap();
    let branches: Vec<&str> = linearized.messages.iter().map(|m| m.branch_id.as_str()).collect();
    assert_eq!(branches, vec!["0", "0.0", "0.1"]);
    assert!(detect_edit_branches(&linearized.messages).is_empty());
}

#[test]
fn test_edge_case_null_content_and_messages_are_empty() {
    let workspace = Workspace::new();
    let path = workspace.export(
        "claude.json",
        &[
            json!({"name": "n", "uuid": "u", "chat_messages": [
                {"uuid": "a", "sender": "human", "text": "hi", "content": null, "created_at": "2024-01-01T00:00:00Z"}
            ]}),
            json!({"name": "Nothing yet", "uuid": "v", "chat_messages": null}),
        ],
    );

    let parsed = load_export(&path).unwrap();
    assert_eq!(parsed.len(), 2);

    let linearized = linearize(&parsed).unwrap();
    assert_eq!(linearized.messages.len(), 1);
    assert_eq!(linearized.messages[0].text, "hi");
}

#[test]
fn test_edge_case_numeric_name_is_kept_as_text() {
    let workspace = Workspace::new();
    let path = workspace.export(
        "claude.json",
        &[json!({"name": 42, "uuid": "u", "chat_messages": [
            {"uuid": "a", "sender": "human", "text": "hi", "created_at": "2024-01-01T00:00:00Z"}
        ]})],
    );

    let linearized = linearize(&load_export(&path).unwrap()).unwrap();
    assert_eq!(linearized.messages[0].chat_name, "42");
}

#[test]
fn test_edge_case_undecodable_conversation_is_skipped() {
    let workspace = Workspace::new();
    let path = workspace.export(
        "claude.json",
        &[
            ClaudeConversationBuilder::new("Fine one").exchange("a", "2024-01-02T00:00:00Z", 2).to_json(),
            json!({"name": "Broken", "chat_messages": {"not": "a list"}}),
            ClaudeConversationBuilder::new("Fine two").exchange("b", "2024-01-03T00:00:00Z", 2).to_json(),
        ],
    );

    let parsed = load_export(&path).unwrap();
    assert_eq!(parsed.len(), 2);
    let linearized = linearize(&parsed).unwrap();
    assert_eq!(linearized.messages.len(), 4);
}

#[test]
fn test_edge_case_mostly_undecodable_export_is_rejected() {
    let workspace = Workspace::new();
    let path = workspace.export(
        "claude.json",
        &[
            ClaudeConversationBuilder::new("Fine").exchange("a", "2024-01-02T00:00:00Z", 2).to_json(),
            json!({"name": "Broken", "chat_messages": 7}),
            json!({"name": "Broken too", "chat_messages": "x"}),
        ],
    );

    let result = load_export(&path);
    assert!(matches!(result, Err(FormatError::TooManyInvalid { failed: 2, total: 3 })));
}
