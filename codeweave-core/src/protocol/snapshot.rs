//! Serialized view of the virtual project tree
//!
//! The orchestrator only reads a snapshot to build prompt context. Applying a
//! structured result is left to the project store; `apply` is provided for
//! stores that keep their files in memory.

use super::types::{CompletionRequest, FileEdit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current file contents keyed by path
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectSnapshot {
    files: BTreeMap<String, String>,
}

/// Paths touched by `ProjectSnapshot::apply`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

impl ProjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Render every file as a prompt context block
    pub fn render_context(&self) -> String {
        let mut out = String::from("Current project files:\n");
        for (path, content) in &self.files {
            out.push_str("\nFile: ");
            out.push_str(path);
            out.push_str("\n```\n");
            out.push_str(content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out
    }

    /// Create-if-absent, else overwrite
    pub fn apply(&mut self, edits: &[FileEdit]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for edit in edits {
            match self.files.insert(edit.path.clone(), edit.content.clone()) {
                Some(_) => report.updated.push(edit.path.clone()),
                None => report.created.push(edit.path.clone()),
            }
        }
        report
    }
}

impl CompletionRequest {
    /// Prepend the project context to the prompt
    pub fn with_project(mut self, snapshot: &ProjectSnapshot) -> Self {
        if snapshot.is_empty() {
            return self;
        }
        self.prompt = format!("{}\n{}", snapshot.render_context(), self.prompt);
        self
    }
}
