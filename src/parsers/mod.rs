//! Parsers for ChatGPT and Claude conversation exports
//!
//! # Error Handling Strategy
//!
//! Parsing follows a **graceful degradation** approach:
//!
//! - **Payload-level failures**: An unrecognised schema, unreadable file or invalid JSON
//!   is a [`FormatError`](crate::error::FormatError) and fails the whole task.
//!
//! - **Message-level failures**: Messages with missing or unparsable timestamps are dropped
//!   silently (debug-logged). Their children become roots of the conversation tree.
//!
//! - **Conversation-level failures**: Each conversation is decoded on its own. One that
//!   still fails is logged and skipped; more than half failing is
//!   [`FormatError::TooManyInvalid`](crate::error::FormatError::TooManyInvalid).
//!
//! - **Lenient models**: Missing and `null` fields take their defaults and scalar names
//!   are stringified, so odd field values rarely cost a conversation.

pub mod deserializers;
pub mod format;
pub mod tree;

pub use format::{detect, detect_format, load_export, parse_export, read_payload};
pub use tree::{ConversationTree, build_trees};
