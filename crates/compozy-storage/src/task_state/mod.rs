//! The task-state repository: storage and hierarchy queries for `task_states`.

mod error;
mod model;
mod repository;

pub use error::{Result, TaskStateError};
pub use model::{
    ChildOutput, ListStatesFilter, NewTaskState, ProgressInfo, TaskComponent, TaskState,
    TaskStatus, TaskTreeNode,
};
pub use repository::TaskStateRepository;
