pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Rejected, Result};
pub use crate::executor::{DynTask, Execute, Queue, Task, TaskId, TaskRef, TaskStatus};
pub use crate::telemetry::MetricsSnapshot;

pub use crate::{scope, scope_with_config};
