//! Shared domain and wire types for the taskboard client.
//!
//! Everything here is plain data: the task and project records the REST API
//! returns, the request payloads it accepts, the auth payloads, and the
//! frames exchanged over the push channel. No I/O lives in this crate.

pub mod auth;
pub mod id;
pub mod project;
pub mod push;
pub mod task;

pub use auth::{AuthToken, LoginRequest, SignupRequest};
pub use id::{ProjectId, TaskId};
pub use project::{NewProject, Project};
pub use push::{ClientFrame, ServerFrame};
pub use task::{CommentUpdate, NewTask, StatusUpdate, Task, TaskStatus};
