pub mod app;
pub mod cache;
pub mod coordinator;
pub mod core;
pub mod dispatch;
pub mod estimator;
pub mod fanout;
pub mod store;
