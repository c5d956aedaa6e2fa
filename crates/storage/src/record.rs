//! Domain record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// The kind of domain record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Todo,
    Project,
    TestCase,
}

impl RecordKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            RecordKind::Todo => "todo",
            RecordKind::Project => "project",
            RecordKind::TestCase => "test_case",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(RecordKind::Todo),
            "project" => Some(RecordKind::Project),
            "test_case" => Some(RecordKind::TestCase),
            _ => None,
        }
    }
}

/// A caller-owned domain record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub owner: String,
    pub kind: RecordKind,
    pub title: String,
    /// Free-form notes or structured payload, depending on the kind.
    #[serde(default)]
    pub body: serde_json::Value,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(owner: impl Into<String>, kind: RecordKind, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            owner: owner.into(),
            kind,
            title: title.into(),
            body: serde_json::Value::Null,
            done: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_round_trips_as_string() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn kind_round_trips() {
        for kind in [RecordKind::Todo, RecordKind::Project, RecordKind::TestCase] {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("mystery"), None);
    }
}
