pub mod boards;
pub mod tasks;
pub mod users;
