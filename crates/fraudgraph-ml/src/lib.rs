//! # FraudGraph ML
//!
//! HTTP client for the external k-means clustering service.

pub mod client;

pub use client::{HttpClusterer, DEFAULT_ML_URL};
