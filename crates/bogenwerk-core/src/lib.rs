// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bogenwerk — Core types, tags, configuration, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod tags;
pub mod types;

pub use config::{AppConfig, ExportConfig, ResolverConfig};
pub use error::BogenwerkError;
pub use tags::TagRegistry;
pub use types::*;
