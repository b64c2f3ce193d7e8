pub mod activity;
pub mod core;
pub mod goals;
pub mod interviews;
pub mod knowledge;
pub mod tasks;
pub mod teachers;
