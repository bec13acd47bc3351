//! Per-server record of the last ingested update time

use crate::types::{ServerId, Timestamp};
use std::collections::HashMap;

/// Last successfully ingested manifest timestamp, per server
///
/// Values only move forward when callers follow the protocol of checking
/// `should_ingest` before `record`; `MarketStore::ingest` does both under one
/// write guard.
#[derive(Debug, Clone, Default)]
pub struct FreshnessTable {
    last_ingested: HashMap<ServerId, Timestamp>,
}

impl FreshnessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the server has never been ingested or `candidate` is strictly
    /// newer than what was ingested last
    pub fn should_ingest(&self, server_id: ServerId, candidate: Timestamp) -> bool {
        match self.last_ingested.get(&server_id) {
            Some(stored) => candidate > *stored,
            None => true,
        }
    }

    /// Overwrites the stored timestamp unconditionally
    pub fn record(&mut self, server_id: ServerId, timestamp: Timestamp) {
        self.last_ingested.insert(server_id, timestamp);
    }

    pub fn get(&self, server_id: ServerId) -> Option<Timestamp> {
        self.last_ingested.get(&server_id).copied()
    }

    pub fn server_ids(&self) -> impl Iterator<Item = ServerId> + '_ {
        self.last_ingested.keys().copied()
    }
}
