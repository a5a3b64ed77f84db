use serde::{Deserialize, Serialize};

/// Operation applied to a line and fanned out to its sub-objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// HTTP method the operation maps to at the storage boundary.
    pub fn method(self) -> &'static str {
        match self {
            Operation::Read => "GET",
            Operation::Create => "POST",
            Operation::Update => "PUT",
            Operation::Delete => "DELETE",
        }
    }

    pub fn is_delete(self) -> bool {
        self == Operation::Delete
    }

    /// Whether the operation may carry a request body.
    pub fn carries_body(self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.method())
    }
}
