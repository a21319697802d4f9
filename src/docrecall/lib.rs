//! # Docrecall Architecture
//!
//! Docrecall is a **crash-recovery persistence engine for text editors**. It keeps
//! two kinds of state for every open document, keyed by the document's path:
//!
//! - **Hot Close**: unsaved text, cursor, scroll and undo history, so an unclean
//!   shutdown loses nothing.
//! - **Local History**: a bounded series of full-text snapshots taken at save time,
//!   which a user can browse and restore.
//!
//! Like any UI-agnostic library, the binary in this crate is one client among
//! many. An editor embeds [`api::RecallApi`] directly.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, formats output, confirms destruction   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Facade over commands, owns the debounce handles          │
//! │  - Dependencies injected: codec, upserter, retention        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Capture, read, delete, wipe, stats, doctor               │
//! │  - Upsert and retention rules (upsert.rs, retention.rs)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/, schema.rs)                          │
//! │  - Abstract TableStore trait, five bounded tables           │
//! │  - SqliteStore (production), InMemoryStore (testing)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Writes Never Crash the Editor
//!
//! From `api.rs` inward, storage faults are values, not errors. A full table
//! triggers eviction and one retry; a uniqueness conflict becomes an update;
//! anything else abandons that single write and is logged through `tracing`.
//! Reads of missing or corrupt data come back empty.
//!
//! ## Module Overview
//!
//! - [`api`]: The facade, entry point for all operations
//! - [`commands`]: Logic for each operation
//! - [`upsert`]: Insert, conflict-to-update, evict-and-retry-once
//! - [`retention`]: Session purge and capacity eviction
//! - [`scheduler`]: Per-session debounce handles
//! - [`schema`]: Table definitions and startup creation
//! - [`store`]: Storage abstraction and implementations
//! - [`codec`]: Reversible value encoding
//! - [`editor`]: The read-only editor session interface
//! - [`model`]: Core data types (`SessionKey`, `Table`, `Snapshot`)
//! - [`config`]: Configuration management
//! - [`init`]: Data directory resolution and context setup
//! - [`error`]: Error types

pub mod api;
pub mod codec;
pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod init;
pub mod model;
pub mod retention;
pub mod scheduler;
pub mod schema;
pub mod store;
pub mod upsert;
