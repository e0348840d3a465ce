// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Mnemos memory engine.
//!
//! WAL-mode SQLite with embedded migrations, a single background writer via
//! `tokio-rusqlite`, explicit transactions, and typed queries for the
//! conversation log and rolling summaries.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::{Database, Transaction};
pub use models::*;
