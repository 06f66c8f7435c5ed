//! Snowflake-style record ids: 41 bits of milliseconds since a custom epoch,
//! 10 bits of worker id, 12 bits of per-millisecond sequence.

use std::sync::Mutex;

use keystone_core::{utc_now_millis, RecordId};

/// 2024-01-01T00:00:00Z.
const EPOCH_MS: i64 = 1_704_067_200_000;
const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;

#[derive(Debug)]
struct State {
    last_ms: i64,
    sequence: u64,
}

/// Monotonic id source, safe to share across request handlers.
#[derive(Debug)]
pub struct IdGenerator {
    worker_id: u64,
    state: Mutex<State>,
}

impl IdGenerator {
    /// `worker_id` is masked to 10 bits.
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: u64::from(worker_id & MAX_WORKER_ID),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    pub fn next_id(&self) -> RecordId {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut now = utc_now_millis().max(state.last_ms);
        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond: borrow the next one.
                now += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        let elapsed = (now - EPOCH_MS).max(0) as u64;
        RecordId::from_u64(
            (elapsed << (WORKER_BITS + SEQUENCE_BITS))
                | (self.worker_id << SEQUENCE_BITS)
                | state.sequence,
        )
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids = IdGenerator::new(3);
        let mut last = RecordId::ROOT;
        for _ in 0..10_000 {
            let id = ids.next_id();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn worker_id_is_embedded() {
        let id = IdGenerator::new(5).next_id().as_u64();
        assert_eq!((id >> SEQUENCE_BITS) & u64::from(MAX_WORKER_ID), 5);
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let ids = Arc::new(IdGenerator::new(1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..2_000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
    }
}
