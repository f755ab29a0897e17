pub mod auth;
pub mod config;
pub mod core;
pub mod error;
pub mod server;

pub use crate::core::board::{Confirm, Kanban, Removed, TaskBoard};
pub use crate::core::db::{BoardDb, TrackerStore};
pub use crate::core::notify::{Notification, NotificationService};
pub use crate::core::remote::RemoteDb;
pub use crate::core::session::Session;
pub use crate::core::workflow::{Rejection, StatusChange};
pub use error::{BoardError, BoardResult};
