use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a filter directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Listing or bootstrapping filters failed
    #[error("failed to fetch filters for {app_name}: {message}")]
    Fetch { app_name: String, message: String },

    /// Creating, updating or deleting a filter failed
    #[error("failed to {operation} filter: {message}")]
    Mutation {
        operation: MutationOp,
        message: String,
    },

    /// The directory did not answer in time
    #[error("fetching filters for {app_name} timed out after {after:?}")]
    Timeout { app_name: String, after: Duration },
}

impl DirectoryError {
    pub fn fetch(app_name: impl Into<String>, message: impl Into<String>) -> Self {
        DirectoryError::Fetch {
            app_name: app_name.into(),
            message: message.into(),
        }
    }

    pub fn mutation(operation: MutationOp, message: impl Into<String>) -> Self {
        DirectoryError::Mutation {
            operation,
            message: message.into(),
        }
    }

    /// Read-side failure (a timeout counts as a failed fetch).
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            DirectoryError::Fetch { .. } | DirectoryError::Timeout { .. }
        )
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, DirectoryError::Mutation { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Add,
    Update,
    Delete,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationOp::Add => "add",
            MutationOp::Update => "update",
            MutationOp::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Invalid input or configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("application name must not be empty")]
    EmptyAppName,

    #[error("unknown filter action `{0}`")]
    UnknownAction(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
