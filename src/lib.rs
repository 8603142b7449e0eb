pub mod config;
pub mod engine;
pub mod generator;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod policy;
pub mod store;
pub mod tenant;
pub mod wal;
