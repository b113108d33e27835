//! Unified error types for the corral workspace.
//!
//! Resolution errors carry the service (and, where relevant, the field)
//! they were raised for so that a failing manifest can be diagnosed from
//! the message alone.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CorralError {
    /// The manifest is structurally malformed.
    #[error("parse error in {location}: {message}")]
    Parse {
        /// Where the problem was found (file, service, or `service.field`).
        location: String,
        /// Description of the problem.
        message: String,
    },

    /// A chain of `extends` references loops back on itself.
    #[error("extends cycle detected: {}", chain.join(" -> "))]
    ExtendsCycle {
        /// The services visited, in order, ending with the repeated one.
        chain: Vec<String>,
    },

    /// A sidekick declaration cannot be honoured.
    #[error("invalid sidekick for service \"{service}\": {message}")]
    InvalidSidekick {
        /// Service carrying the faulty declaration.
        service: String,
        /// Description of the problem.
        message: String,
    },

    /// `net: container:<name>` names a container outside the service.
    #[error("service \"{service}\" uses net container:{target}, which is not a sidekick of the same service")]
    UnknownNetworkTarget {
        /// Service declaring the network mode.
        service: String,
        /// Unresolved container name.
        target: String,
    },

    /// The `restart` value is not a recognized policy.
    #[error("invalid restart policy \"{value}\" for service \"{service}\"")]
    InvalidRestartPolicy {
        /// Service declaring the policy.
        service: String,
        /// Raw policy string.
        value: String,
    },

    /// A link names a service that does not exist in the project.
    #[error("service \"{service}\" links to unknown service \"{target}\"")]
    UnknownLinkTarget {
        /// Service declaring the link.
        service: String,
        /// Unresolved link target.
        target: String,
    },

    /// A service links to itself.
    #[error("service \"{service}\" cannot link to itself")]
    SelfLink {
        /// The offending service.
        service: String,
    },

    /// The orchestration API was unreachable or answered with a failure.
    #[error("transport error during {operation}: {message}")]
    Transport {
        /// API operation being attempted.
        operation: String,
        /// Underlying failure description.
        message: String,
    },

    /// A project with this name already exists.
    #[error("project \"{name}\" already exists")]
    ProjectExists {
        /// Project name.
        name: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CorralError {
    /// Builds a [`CorralError::Parse`] for the given location.
    pub fn parse(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Builds a [`CorralError::InvalidSidekick`] for the given service.
    pub fn sidekick(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSidekick {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Builds a [`CorralError::Transport`] for the given operation.
    pub fn transport(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CorralError>;
