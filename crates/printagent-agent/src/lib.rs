// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printagent agent: local storage, the backend API client and the job
// processor that drains the backend queue through the print dispatcher.

pub mod api;
pub mod jobs;
pub mod store;

pub use api::{BackendApi, HttpBackend};
pub use jobs::{JobProcessor, PassOutcome};
pub use store::{KvStore, MemoryStore, PrinterRegistry, SqliteStore};
