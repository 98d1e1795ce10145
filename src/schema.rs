use std::fmt;

use crate::error::{GridError, Result};

/// Category of remote entity whose status listing we parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Run,
    Session,
    Datastore,
    Clusters,
    History,
}

// Column layouts as rendered by the grid CLI. The empty labels at either end
// are the cells produced by the outer box border.
const RUN_COLUMNS: &[&str] = &[
    "",
    "run",
    "project",
    "status",
    "duration",
    "experiments",
    "running",
    "queued",
    "completed",
    "failed",
    "stopped",
    "",
];
const SESSION_COLUMNS: &[&str] = &["", "session", "status", "instance type", "duration", "url", ""];
const DATASTORE_COLUMNS: &[&str] = &[
    "",
    "cluster id",
    "name",
    "version",
    "size",
    "created",
    "created by",
    "status",
    "",
];
const CLUSTERS_COLUMNS: &[&str] = &["", "id", "name", "type", "status", "created", ""];
const HISTORY_COLUMNS: &[&str] = &[
    "",
    "run",
    "created at",
    "experiments",
    "failed",
    "stopped",
    "completed",
    "",
];

impl ObjectType {
    /// Expected column labels, lowercase, in rendered order.
    ///
    /// These must track the external tool's table layout by hand; a drift
    /// silently shifts every index.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            ObjectType::Run => RUN_COLUMNS,
            ObjectType::Session => SESSION_COLUMNS,
            ObjectType::Datastore => DATASTORE_COLUMNS,
            ObjectType::Clusters => CLUSTERS_COLUMNS,
            ObjectType::History => HISTORY_COLUMNS,
        }
    }

    /// Resolve a human column label to its cell index.
    pub fn column_index(&self, column_name: &str) -> Result<usize> {
        let wanted = column_name.to_lowercase();
        self.columns()
            .iter()
            .position(|c| *c == wanted)
            .ok_or_else(|| GridError::UnknownColumn {
                object_type: self.to_string(),
                column: wanted,
            })
    }

    pub fn all() -> &'static [ObjectType] {
        &[
            ObjectType::Run,
            ObjectType::Session,
            ObjectType::Datastore,
            ObjectType::Clusters,
            ObjectType::History,
        ]
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Run => write!(f, "run"),
            ObjectType::Session => write!(f, "session"),
            ObjectType::Datastore => write!(f, "datastore"),
            ObjectType::Clusters => write!(f, "clusters"),
            ObjectType::History => write!(f, "history"),
        }
    }
}

impl std::str::FromStr for ObjectType {
    type Err = GridError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        // The listing command is singular, the schema key was plural.
        let canonical = match wanted.as_str() {
            "datastores" => "datastore",
            "cluster" => "clusters",
            other => other,
        };
        ObjectType::all()
            .iter()
            .copied()
            .find(|object_type| object_type.to_string() == canonical)
            .ok_or_else(|| GridError::UnknownObjectType(s.to_string()))
    }
}
