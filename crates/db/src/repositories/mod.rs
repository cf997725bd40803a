//! Repositories: the only code that talks to the store.

mod department;
mod group;
mod tracker;
mod user;

pub use department::DepartmentRepository;
pub use group::GroupRepository;
pub use tracker::{NewTracker, TrackerPageQuery, TrackerRepository, TrackerSortField};
pub use user::UserRepository;

use doctrack_common::AppError;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ColumnTrait, Condition, DbErr, SqlErr};

/// Map a failed insert or update, reporting unique-key collisions as `Conflict`.
pub(crate) fn write_error(err: &DbErr, conflict: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(%detail, "Unique constraint violated");
            AppError::Conflict(conflict.to_string())
        }
        _ => AppError::Database(err.to_string()),
    }
}

/// Escape `LIKE` wildcards in user input and wrap it for a substring match.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Case-insensitive substring match against any of `columns`.
pub(crate) fn search_condition<C: ColumnTrait + Copy>(columns: &[C], term: &str) -> Condition {
    let pattern = like_pattern(term);
    columns.iter().fold(Condition::any(), |cond, col| {
        let lowered = Func::lower(Expr::col((col.entity_name(), *col)));
        cond.add(Expr::expr(lowered).like(pattern.clone()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Memo"), "%memo%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_write_error_passes_other_failures_through() {
        let err = DbErr::Custom("connection reset".to_string());
        assert!(matches!(
            write_error(&err, "taken"),
            AppError::Database(msg) if msg.contains("connection reset")
        ));
    }
}
