//! Error types for protocol compilation

use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compilation errors
///
/// Every variant is fatal: the run aborts and no artifacts are written.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Endpoint {command_id} does not have a source field")]
    MissingSource { command_id: String },

    #[error("Endpoint {command_id} does not have a target field")]
    MissingTarget { command_id: String },

    #[error("Endpoint {command_id} has unrecognized {field} actor '{actor}'")]
    UnknownActor {
        command_id: String,
        field: &'static str,
        actor: String,
    },

    #[error("Endpoint {command_id} cannot have both a request and an event")]
    RequestAndEvent { command_id: String },

    #[error("Endpoint {command_id} must have either a request or an event")]
    NoRequestOrEvent { command_id: String },

    #[error("Endpoint {command_id} must have a response if it has a request")]
    RequestWithoutResponse { command_id: String },

    #[error("Endpoint {command_id} must have a request if it has a response")]
    ResponseWithoutRequest { command_id: String },

    #[error("Endpoint {command_id} does not have a success response")]
    MissingSuccessResponse { command_id: String },

    #[error("Endpoint {command_id} does not have a failed response")]
    MissingFailedResponse { command_id: String },

    #[error("Endpoint {command_id} has multiple success responses but success response #{index} has no title")]
    AmbiguousSuccessVariant { command_id: String, index: usize },

    #[error("Endpoint {command_id} is malformed: {reason}")]
    InvalidEndpoint { command_id: String, reason: String },

    #[error("Invalid {kind} identifier '{id}': must be non-empty and must not contain '/' (or '.' in service names)")]
    InvalidIdentifier { kind: &'static str, id: String },

    #[error("Definition {file}: {reason}")]
    DefinitionNameMismatch { file: String, reason: String },

    #[error("Definition schema does not have a $id field: {file}")]
    DefinitionMissingId { file: String },

    #[error("Duplicate definition $id '{id}'")]
    DuplicateDefinition { id: String },

    #[error("{owner} references unknown definition '{reference}'")]
    UnresolvedReference { owner: String, reference: String },

    #[error("Command {command_id} was registered more than once")]
    DuplicateCommand { command_id: String },

    #[error("Compiled schema contains dangling reference '{reference}'")]
    DanglingReference { reference: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl CompileError {
    /// The CommandId this error is qualified with, if it concerns one endpoint
    pub fn command_id(&self) -> Option<&str> {
        match self {
            Self::MissingSource { command_id }
            | Self::MissingTarget { command_id }
            | Self::UnknownActor { command_id, .. }
            | Self::RequestAndEvent { command_id }
            | Self::NoRequestOrEvent { command_id }
            | Self::RequestWithoutResponse { command_id }
            | Self::ResponseWithoutRequest { command_id }
            | Self::MissingSuccessResponse { command_id }
            | Self::MissingFailedResponse { command_id }
            | Self::AmbiguousSuccessVariant { command_id, .. }
            | Self::InvalidEndpoint { command_id, .. }
            | Self::DuplicateCommand { command_id } => Some(command_id),
            _ => None,
        }
    }
}
