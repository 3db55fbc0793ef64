//! Shared database schema, migrations, and query builders.
//!
//! Every builder returns a [`Built`] pair of SQL text and bind values for
//! SQLite. Callers bind the values in order.

pub mod attachments;
pub mod boards;
pub mod comments;
pub mod invitations;
pub mod labels;
pub mod lists;
pub mod migrations;
pub mod notifications;
pub mod tables;
pub mod tasks;
pub mod teams;
pub mod time_entries;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

/// SQL text plus positional bind values.
pub type Built = (String, sea_query::Values);

/// `datetime('now')` as a sea-query expression.
pub(crate) fn now_expr() -> sea_query::SimpleExpr {
    sea_query::Expr::cust("datetime('now')")
}
