//! Exhaustive enumeration of two-way splits of the item pool.
//!
//! Pools are tiny (at most a handful of items per category), so every search
//! in the crate walks the full list. The order is fixed: the first category
//! varies slowest and each share counts upward from zero. Tie-breaking in the
//! proposal policy depends on that order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;

use crate::domain::{Allocation, ItemCounts, Seat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Partition {
    pub first: Allocation,
    pub second: Allocation,
}

impl Partition {
    pub fn share_for(&self, seat: Seat) -> Allocation {
        match seat {
            Seat::First => self.first,
            Seat::Second => self.second,
        }
    }
}

/// Every `(first, second)` pair with `first + second == counts`.
pub fn generate(counts: &ItemCounts) -> Vec<Partition> {
    let [books, hats, balls] = counts.as_array();
    let mut partitions = Vec::with_capacity(counts.partition_count());
    for book in 0..=books {
        for hat in 0..=hats {
            for ball in 0..=balls {
                partitions.push(Partition {
                    first: Allocation::new([book, hat, ball]),
                    second: Allocation::new([books - book, hats - hat, balls - ball]),
                });
            }
        }
    }
    partitions
}

static CACHE: OnceLock<Mutex<HashMap<ItemCounts, Arc<[Partition]>>>> = OnceLock::new();

/// Cached partition list for one pool.
#[derive(Clone, Debug)]
pub struct PartitionSpace {
    counts: ItemCounts,
    partitions: Arc<[Partition]>,
}

impl PartitionSpace {
    pub fn new(counts: ItemCounts) -> Self {
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut entries = match cache.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let partitions =
            entries.entry(counts).or_insert_with(|| Arc::from(generate(&counts))).clone();
        Self { counts, partitions }
    }

    pub fn counts(&self) -> &ItemCounts {
        &self.counts
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// The shares a given seat could claim, in enumeration order.
    pub fn shares_for(&self, seat: Seat) -> impl Iterator<Item = Allocation> + '_ {
        self.partitions.iter().map(move |partition| partition.share_for(seat))
    }
}
