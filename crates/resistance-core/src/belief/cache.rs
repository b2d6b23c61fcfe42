//! Memoization of search values keyed by the exact belief contents.

use super::BeliefState;
use crate::model::outcome::ResultSequence;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Exact search position: round, history and the bit pattern of every mass.
///
/// Dual-model searches also key on the second (real-model) state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeliefCacheKey {
    round: u8,
    results: ResultSequence,
    belief: Box<[u64]>,
    real: Option<Box<[u64]>>,
}

impl BeliefCacheKey {
    pub fn new(round: u8, results: &ResultSequence, belief: &BeliefState) -> Self {
        Self {
            round,
            results: results.clone(),
            belief: belief.mass_bits(),
            real: None,
        }
    }

    pub fn paired(
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
        real: &BeliefState,
    ) -> Self {
        Self {
            real: Some(real.mass_bits()),
            ..Self::new(round, results, belief)
        }
    }

    pub fn round(&self) -> u8 {
        self.round
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
}

/// Bounded value cache with first-in, first-out eviction.
#[derive(Debug)]
pub struct ValueCache {
    entries: HashMap<BeliefCacheKey, f64>,
    order: VecDeque<BeliefCacheKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ValueCache {
    pub const DEFAULT_CAPACITY: usize = 1 << 16;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&mut self, key: &BeliefCacheKey) -> Option<f64> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(*value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: BeliefCacheKey, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        self.evict_if_needed();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
            evictions: self.evictions,
        }
    }

    fn evict_if_needed(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.evictions += 1;
            }
        }
    }
}

impl Default for ValueCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
