use engine_core::error::RepositoryError;
use mongodb::error::{Error, ErrorKind, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR};

/// Maps a driver error to a query failure, keeping transient errors retryable.
pub fn query_error(err: Error) -> RepositoryError {
    if is_transient(&err) {
        RepositoryError::Transient(err.to_string())
    } else {
        RepositoryError::Query(err.to_string())
    }
}

/// Maps a driver error to a write failure, keeping transient errors retryable.
pub fn write_error(err: Error) -> RepositoryError {
    if is_transient(&err) {
        RepositoryError::Transient(err.to_string())
    } else {
        RepositoryError::Write(err.to_string())
    }
}

/// Network, server selection and pool errors, plus anything the server labels retryable.
pub fn is_transient(err: &Error) -> bool {
    if err.contains_label(RETRYABLE_WRITE_ERROR)
        || err.contains_label(TRANSIENT_TRANSACTION_ERROR)
    {
        return true;
    }

    matches!(
        *err.kind,
        ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
    )
}

/// Server error code of a rejected command, or zero when the server never answered.
pub fn command_code(err: &Error) -> i32 {
    match &*err.kind {
        ErrorKind::Command(command) => command.code,
        _ => 0,
    }
}
