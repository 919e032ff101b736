// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: bridges the command line to the printagent crates.
//
// Each service method wraps one or more crate APIs and returns data the CLI
// can print directly.

pub mod app_services;
pub mod data_dir;
