use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

/// Discriminant of the queue's job variants. Each kind is claimed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "jobkind", rename_all = "lowercase")]
pub(crate) enum JobKind {
    File,
    Text,
}

impl JobKind {
    pub(crate) const ALL: [JobKind; 2] = [JobKind::File, JobKind::Text];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

/// Producer-supplied task flavour, persisted as an integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TaskType {
    Generic,
}

impl TaskType {
    pub(crate) fn code(self) -> i32 {
        match self {
            Self::Generic => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Generic),
            _ => None,
        }
    }
}

/// Role of an uploaded file, persisted as an integer code in `files.file_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FileRole {
    StudentCopy,
    StudentResponse,
    TeacherKey,
    TeacherContext,
}

impl FileRole {
    pub(crate) const ALL: [Self; 4] =
        [Self::StudentCopy, Self::StudentResponse, Self::TeacherKey, Self::TeacherContext];

    pub(crate) fn code(self) -> i32 {
        match self {
            Self::StudentCopy => 1,
            Self::StudentResponse => 2,
            Self::TeacherKey => 3,
            Self::TeacherContext => 4,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.code() == code)
    }
}

/// Opaque reference to a stored file or a cached derived result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct EntityRef(Uuid);

impl EntityRef {
    pub(crate) fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub(crate) fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Object storage key for the file behind this reference.
    pub(crate) fn object_key(&self) -> String {
        self.0.to_string()
    }
}

impl From<Uuid> for EntityRef {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityRef {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}
