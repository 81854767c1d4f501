//! Persistence layer: libSQL-backed storage for emails, user config and
//! notifications.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, EmailRecord, NewEmail, NewNotification, Notification};
