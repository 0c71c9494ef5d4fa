pub mod model;
pub mod service;

pub use model::{CreateTaskPayload, Task, UpdateTaskPayload};
pub use service::*;
