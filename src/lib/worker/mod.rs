pub mod api;
pub mod store;
pub mod types;
pub mod worker;
