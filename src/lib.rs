//! Client-side task board for one project at a time.
//!
//! [`sync::TaskBoardSync`] holds the local task collection and decides what
//! each server response or push event does to it. [`board::BoardSession`]
//! wires that state to the REST API ([`api`]) and the WebSocket push
//! channel ([`push`]). Columns are derived on demand by [`view`].

pub mod api;
pub mod board;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod logging;
pub mod push;
pub mod sync;
pub mod view;

pub use api::{HttpApi, TaskApi};
pub use board::{BoardCommand, BoardEvent, BoardHandle, BoardSession};
pub use config::ClientConfig;
pub use errors::{ApiError, SyncError};
pub use push::{PushChannel, PushDelivery, PushEvent, WsPushChannel};
pub use sync::{Subscription, TaskBoardSync, TaskCollection};
pub use view::{BoardView, ColumnView, partition_by_status};
