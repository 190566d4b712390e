//! taskflow - Multi-Tenant Task Board Core
//!
//! This library provides the core of a workspace-scoped Kanban application:
//! a typed client over a live document store, the board's reconciliation
//! state machine, and the derived views computed from the same task stream.
//!
//! # Core Concepts
//!
//! - **Workspaces**: companies as the tenant boundary; every task belongs
//!   to exactly one
//! - **Live snapshots**: push-based queries that re-deliver the full
//!   matching set on every change; each delivery is authoritative
//! - **Optimistic updates**: board moves apply locally before the persist
//!   call settles, and revert on failure
//! - **Denormalization**: assignee and sender identity are copied into
//!   referencing records instead of joined at read time
//! - **Fan-out**: one notification document per recipient per event
//!
//! # Module Organization
//!
//! - `board`: drag-and-drop reconciliation over live task snapshots
//! - `company`: workspace membership, join requests, onboarding profiles
//! - `config`: configuration loading from `.taskflow.toml`
//! - `error`: error types and result aliases
//! - `model`: record types per collection and the validation boundary
//! - `notify`: notification fan-out and the bounded per-user feed
//! - `session`: explicitly passed session context for the current user
//! - `store`: in-memory document store with cancellable live queries
//! - `tasks`: task repository (CRUD, comments, workspace subscription)
//! - `workload`: pure per-member and workspace-wide derivations

pub mod board;
pub mod company;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod session;
pub mod store;
pub mod tasks;
pub mod workload;

pub use error::{Error, Result};
