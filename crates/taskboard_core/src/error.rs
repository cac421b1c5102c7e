use crate::model::ResolvedTask;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("not_found - {0}")]
    NotFound(String),
    /// The client's fingerprint no longer matches; `current` is the persisted
    /// state the caller should diff against before retrying with force.
    #[error("conflict - {message}")]
    Conflict {
        message: String,
        current: Box<ResolvedTask>,
    },
    #[error("no_users_available - {0}")]
    NoUsersAvailable(String),
    #[error("store_error - {0}")]
    Store(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(current: ResolvedTask) -> Self {
        Self::Conflict {
            message: "Conflict detected".to_string(),
            current: Box::new(current),
        }
    }

    pub fn no_users_available<M: Into<String>>(message: M) -> Self {
        Self::NoUsersAvailable(message.into())
    }

    pub fn store<M: Into<String>>(message: M) -> Self {
        Self::Store(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::NoUsersAvailable(_) => "no_users_available",
            Self::Store(_) => "store_error",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message) => message,
            Self::NotFound(message) => message,
            Self::Conflict { message, .. } => message,
            Self::NoUsersAvailable(message) => message,
            Self::Store(message) => message,
            Self::InvalidData(message) => message,
            Self::Io(message) => message,
        }
    }

    /// Status code a request/response transport should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::NoUsersAvailable(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict { .. } => 409,
            Self::Store(_) | Self::InvalidData(_) | Self::Io(_) => 500,
        }
    }

    /// The persisted task state carried by a conflict.
    pub fn conflict_state(&self) -> Option<&ResolvedTask> {
        match self {
            Self::Conflict { current, .. } => Some(current),
            _ => None,
        }
    }
}
