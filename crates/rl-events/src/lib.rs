pub mod bus;
pub mod signal;
pub mod types;
