//! FraudGraph Core Library
//!
//! Domain model, entity schema and fraud analytics for the FraudGraph service.

pub mod analytics;
pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod store;
pub mod timestamp;

pub use error::{ClusterError, FraudError, FraudResult};
