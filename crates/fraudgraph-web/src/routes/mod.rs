//! Route handlers.

pub mod analytics;
pub mod nodes;
pub mod relations;
pub mod service;

use serde::Serialize;
use std::collections::BTreeMap;

/// Standard list envelope: `{"count": n, "<name>": [...]}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    count: usize,
    #[serde(flatten)]
    items: BTreeMap<&'static str, Vec<T>>,
}

impl<T> Envelope<T> {
    pub fn new(name: &'static str, items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items: BTreeMap::from([(name, items)]),
        }
    }
}
