pub mod api;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod limits;
pub mod mirror;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reconcile;
pub mod store;
