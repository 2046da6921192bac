// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared blackboard: the data exchange mechanism between services.
//!
//! The blackboard is a tree of nested JSON maps addressed by `/`-separated
//! paths.  Services read their inputs from it and write their results onto
//! it; the executor records run bookkeeping under `services/<ident>/…`.
//! It also keeps an ordered list of timestamped log lines which can be
//! included in the final snapshot.

use serde_json::{Map, Value};

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Hierarchical key/value store shared between services.
pub struct Blackboard {
    data: Map<String, Value>,
    log_lines: Vec<String>,
    verbose: bool,
}

impl Blackboard {
    /// Create an empty blackboard.  When `verbose` is set, log lines are
    /// echoed as tracing events as they are recorded.
    pub fn new(verbose: bool) -> Self {
        let mut board = Self { data: Map::new(), log_lines: Vec::new(), verbose };
        board.log("log started");
        board
    }

    /// Record a timestamped log line.
    pub fn log(&mut self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        if self.verbose {
            tracing::info!("{msg}");
        }
        self.log_lines.push(format!("{} {}", timestamp(), msg));
    }

    /// Return the value at `path`, or `None` if any segment is missing.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('/');
        let mut node = self.data.get(parts.next()?)?;
        for part in parts {
            node = node.as_object()?.get(part)?;
        }
        Some(node)
    }

    /// Return the string at `path`, if present and a string.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Set the value at `path`, creating missing intermediate maps.
    ///
    /// An intermediate node that exists but is not a map is replaced by one.
    /// Empty intermediate segments (as in `a//b`) are skipped.
    pub fn put(&mut self, path: &str, value: impl Into<Value>) {
        let (parents, last) = split_path(path);
        let mut node = &mut self.data;
        for part in parents {
            if part.is_empty() {
                continue;
            }
            let entry = node.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            node = match entry.as_object_mut() {
                Some(map) => map,
                None => return, // just ensured it is an object
            };
        }
        node.insert(last.to_string(), value.into());
    }

    /// Append `value` to the list at `path`, creating it if missing.
    ///
    /// A list value is appended elementwise.  With `uniq`, elements already
    /// present in the list are skipped.
    pub fn append_to(&mut self, path: &str, value: impl Into<Value>, uniq: bool) {
        let value = value.into();
        let (parents, last) = split_path(path);
        let mut node = &mut self.data;
        for part in parents {
            if part.is_empty() {
                continue;
            }
            let entry = node.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            node = match entry.as_object_mut() {
                Some(map) => map,
                None => return,
            };
        }
        let slot = node.entry(last.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        let Some(list) = slot.as_array_mut() else {
            return;
        };
        let items = match value {
            Value::Array(items) => items,
            single => vec![single],
        };
        for item in items {
            if !uniq || !list.contains(&item) {
                list.push(item);
            }
        }
    }

    /// Return a snapshot of the tree.  With `with_log`, the log lines are
    /// injected as a top-level `log` array; otherwise any preexisting `log`
    /// key is removed.
    pub fn as_value(&self, with_log: bool) -> Value {
        let mut data = self.data.clone();
        if with_log {
            let lines = self.log_lines.iter().cloned().map(Value::String).collect();
            data.insert("log".to_string(), Value::Array(lines));
        } else {
            data.remove("log");
        }
        Value::Object(data)
    }
}

/// Split a path into its parent segments and final segment.
fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('/').collect();
    let last = parts.pop().unwrap_or(path);
    (parts, last)
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
