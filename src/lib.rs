//! # senet
//!
//! A Kanban task board engine with AI-assisted task enrichment.
//!
//! ## Architecture
//!
//! - **Board reconciler** (`board`): owns the in-memory task collection and
//!   applies optimistic mutations, each returning a pre-mutation snapshot
//! - **Response normalizer** (`ai::normalize`): coerces free-form model
//!   output into typed records via a two-phase parse (optimistic, then
//!   repaired)
//! - **AI assistant** (`ai`): prompt templates over a chat-completion
//!   endpoint for enhancement, parsing, tagging, insights, prioritization,
//!   and archive categorization
//! - **Stores** (`store`): one `TaskStore` seam with a local JSON-file
//!   backend and a hosted row-store backend, plus polling change
//!   subscriptions
//! - **Sync layer** (`sync`): optimistic-then-confirm write-through with
//!   rollback on store rejection
//!
//! ## Library usage
//!
//! ```no_run
//! use senet::sync::SyncedBoard;
//! use senet::task::{Status, TaskDraft};
//!
//! let mut board = SyncedBoard::detached();
//! let task = board.create(TaskDraft::new("Fix login bug")).unwrap();
//! board.move_to(&task.id, Status::InProgress).unwrap();
//! ```

pub mod ai;
pub mod board;
pub mod error;
pub mod store;
pub mod sync;
pub mod task;
