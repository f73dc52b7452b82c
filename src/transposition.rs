use std::collections::HashMap;

use parking_lot::RwLock;

/// Fraction of the table dropped when it fills up.
const EVICTION_DIVISOR: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Exact,
    LowerBound,
    UpperBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranspositionEntry {
    pub depth: u32,
    pub score: i32,
    pub node_type: NodeType,
}

/// Bounded score cache shared between searches. Losing or overwriting an entry
/// only costs speed: every read is checked against the required depth.
pub struct TranspositionTable {
    table: RwLock<HashMap<u64, TranspositionEntry>>,
    capacity: usize,
}

impl TranspositionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            table: RwLock::new(HashMap::with_capacity(capacity.min(1 << 16))),
            capacity,
        }
    }

    pub fn store(&self, hash: u64, entry: TranspositionEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut table = self.table.write();
        if let Some(existing) = table.get(&hash) {
            if existing.depth > entry.depth {
                return;
            }
        } else if table.len() >= self.capacity {
            let batch = (self.capacity / EVICTION_DIVISOR).max(1);
            let victims: Vec<u64> = table.keys().take(batch).copied().collect();
            for key in victims {
                table.remove(&key);
            }
        }
        table.insert(hash, entry);
    }

    /// Returns a usable score only when the entry was searched at least `depth`
    /// plies deep and its bound settles the `(alpha, beta)` window.
    pub fn probe(&self, hash: u64, depth: u32, alpha: i32, beta: i32) -> Option<i32> {
        let entry = *self.table.read().get(&hash)?;
        if entry.depth < depth {
            return None;
        }
        match entry.node_type {
            NodeType::Exact => Some(entry.score),
            NodeType::LowerBound if entry.score >= beta => Some(entry.score),
            NodeType::UpperBound if entry.score <= alpha => Some(entry.score),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.table.write().clear();
    }
}
