//! Scheduled tasks: records, stores, deferred execution and dependency waits.
//!
//! - [`Task`] / [`TaskStatus`]: the persisted record and its status machine
//! - [`TaskStore`] / [`BlobStore`]: store interfaces, with in-memory and
//!   libSQL implementations
//! - [`TaskScheduler`]: runs scheduled calls after their delay
//! - [`DependencyWaiter`]: blocks a tool until prerequisite tasks complete

mod error;
mod libsql_store;
mod memory;
mod scheduler;
mod store;
mod task;
mod waiter;

pub use error::{StoreError, StoreErrorKind};
pub use libsql_store::LibSqlStore;
pub use memory::{InMemoryBlobStore, InMemoryTaskStore};
pub use scheduler::{
    RetryPolicy, ScheduleTicket, ScheduledRun, SchedulerConfig, TaskScheduler, DEFAULT_DELAY,
};
pub use store::{BlobStore, TaskStore};
pub use task::{NewTask, Task, TaskStatus};
pub use waiter::{DependencyOutputs, DependencyWaiter, WaiterConfig, DEFAULT_POLL_INTERVAL};
