use serde::{Deserialize, Serialize};

/// Abstract lifecycle state of a remote resource.
///
/// Status strings the remote reports are parsed with [`LifecycleState::parse`];
/// anything outside the known vocabulary is kept verbatim as `Other` so the
/// engine can keep polling instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
    NotCreated,
    Pending,
    Active,
    Down,
    Deleted,
    Error,
    Other(String),
}

impl LifecycleState {
    pub fn parse(status: &str) -> Self {
        match status {
            "NOT_CREATED" => LifecycleState::NotCreated,
            "PENDING" => LifecycleState::Pending,
            "ACTIVE" => LifecycleState::Active,
            "DOWN" => LifecycleState::Down,
            "DELETED" => LifecycleState::Deleted,
            "ERROR" => LifecycleState::Error,
            other => LifecycleState::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::NotCreated => "NOT_CREATED",
            LifecycleState::Pending => "PENDING",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Down => "DOWN",
            LifecycleState::Deleted => "DELETED",
            LifecycleState::Error => "ERROR",
            LifecycleState::Other(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        *self == LifecycleState::Error
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LifecycleState {
    fn from(value: String) -> Self {
        LifecycleState::parse(&value)
    }
}

impl From<LifecycleState> for String {
    fn from(value: LifecycleState) -> Self {
        value.as_str().to_owned()
    }
}
