//! Caller-owned session state.
//!
//! The governance layer reads this but never retains or mutates it; the
//! host passes it by value on every call and applies returned actions
//! itself.

use serde::{Deserialize, Serialize};

/// A file the session knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
}

/// How deep an analysis pass should go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

/// Analysis configuration for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub depth: AnalysisDepth,
    pub include_suggestions: bool,
    #[serde(default)]
    pub focus: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            depth: AnalysisDepth::Standard,
            include_suggestions: true,
            focus: None,
        }
    }
}

/// Where the session's long-running analysis stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    #[default]
    Idle,
    Running,
    Complete,
    Cancelled,
}

/// The caller's session state, supplied per call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub files: Vec<FileEntry>,
    pub selected_files: Vec<String>,
    pub config: AnalysisConfig,
    pub analysis: AnalysisState,
}

impl SessionContext {
    pub fn has_file(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}
