pub mod cells;
pub mod core;
pub mod forms;
