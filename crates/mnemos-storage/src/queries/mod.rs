// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the conversation log and its summary.

pub mod messages;
pub mod summaries;

use mnemos_core::MnemosError;

pub(crate) fn sql_err(e: rusqlite::Error) -> MnemosError {
    MnemosError::Storage {
        source: Box::new(e),
    }
}
