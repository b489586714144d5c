//! Branch reconstruction for conversation trees
//!
//! - [`labeler`] turns each conversation tree into flat messages carrying dotted
//!   branch ids ("0", "0.1", "0.1.0") that extend only at genuine forks.
//! - [`edits`] flags forks that look like user edits (siblings sent more than a
//!   minute apart). It is analytics only and never changes branch ids.

pub mod edits;
pub mod labeler;

pub use edits::{EDIT_GAP_THRESHOLD_SECS, EditBranch, detect_edit_branches};
pub use labeler::{Linearized, ROOT_BRANCH_ID, fork_branch_id, label_branches, linearize};
