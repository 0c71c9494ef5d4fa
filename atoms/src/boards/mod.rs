pub mod model;
pub mod service;

pub use model::{Board, Membership};
pub use service::*;
