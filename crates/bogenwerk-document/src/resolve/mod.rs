// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Asset resolution — turns external image/font references into bundle paths.

pub mod css;
pub mod fetch;
pub mod pool;
pub mod resolver;

pub use fetch::{FetchedAsset, Fetcher, HttpFetcher, sniff_extension};
pub use pool::AssetPool;
pub use resolver::{AssetResolver, Resolution};
