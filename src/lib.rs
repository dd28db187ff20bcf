// Copyright 2026 Vigil Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vigil runtime library — drift-tolerant single-value web extraction.
//!
//! Tracks a (URL, selector) pair per item, extracts its value through a
//! tiered strategy (static fetch → headless render → structural
//! fingerprint), records immutable snapshots, fires at-most-once threshold
//! triggers, and rehabilitates broken selectors via an external repair
//! collaborator.

pub mod cli;
pub mod config;
pub mod events;
pub mod extract;
pub mod fingerprint;
pub mod model;
pub mod numeric;
pub mod renderer;
pub mod repair;
pub mod store;
pub mod triggers;
