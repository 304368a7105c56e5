// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic key-value row returned by `find` queries, column order preserved.
//! The HTTP query surface (external) serializes these straight to JSON.

use indexmap::IndexMap;
use serde_json::Value;

pub type Row = IndexMap<String, Value>;
