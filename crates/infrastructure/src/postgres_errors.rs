use keystone_core::AppError;

/// Maps a sqlx error into an application error with context.
///
/// Connectivity failures become `Unavailable` so callers may retry them;
/// everything else is `Internal`.
pub(crate) fn database_error(context: &str, error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::Unavailable(format!("{context}: {error}")),
        _ => AppError::Internal(format!("{context}: {error}")),
    }
}

/// Returns whether the error is a unique constraint violation.
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(database_error) = error {
        return database_error.code().as_deref() == Some("23505");
    }
    false
}

/// Returns whether the error is a foreign key violation.
pub(crate) fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(database_error) = error {
        return database_error.code().as_deref() == Some("23503");
    }
    false
}
