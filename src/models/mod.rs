pub mod project;
pub mod task;
pub mod team;
pub mod user;
