//! PIE: pipelines of incremental execution.
//!
//! Tasks are functions of an input that dynamically create dependencies to other tasks and to resources through an
//! [`ExecContext`]. PIE stores the output and dependencies of every executed task, and only re-executes a task when one
//! of its dependencies is inconsistent. Builds are either top-down, requiring one task with
//! [`Session::require`], or bottom-up, updating all observed tasks affected by changed resources with
//! [`Session::update_affected_by`].

pub use cancel::CancelToken;
pub use context::ExecContext;
pub use dependency::{Observability, TaskData};
pub use error::{BoxError, Error, Result};
pub use pie::{Pie, PieBuilder, Session};
pub use reason::ExecReason;
pub use resource::{ResourceKey, ResourceService};
pub use stamp::{OutputStamper, ResourceStamper};
pub use supplier::Supplier;
pub use task::{Tags, Task, TaskDef, TaskDefs, TaskKey};
pub use value::{Transient, TransientValue, Value};

pub mod cancel;
pub mod context;
pub mod dependency;
pub mod error;
pub mod layer;
pub mod reason;
pub mod resource;
pub mod stamp;
pub mod store;
pub mod supplier;
pub mod task;
pub mod tracker;
pub mod value;

mod pie;
