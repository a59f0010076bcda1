//! # AppReset
//!
//! Reset an application's local identity and session footprint while
//! keeping every change recoverable.
//!
//! AppReset locates an application's persisted state and, for each install:
//!
//! - **Discovery**: resolves per-OS path templates to the data directory
//! - **Backups**: zip or mirror copies before anything is changed, with retention pruning and restore
//! - **Identifier mutation**: fresh machine and session ids in JSON documents and SQLite key/value tables
//! - **Database sanitization**: keyword-driven row removal with validated SQL identifiers
//! - **Cache eviction**: clears cache directories and verifies they are empty
//! - **Progress**: a phase state machine reporting over a bounded channel

pub mod cache;
pub mod cleaner;
pub mod cli;
pub mod common;
pub mod database;
pub mod discovery;
pub mod identity;
pub mod scanner;
