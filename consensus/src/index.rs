//! Watch-index sources for reporters and status requests

use flightsurety_core::{Address, SuretyError, SuretyResult, Timestamp};
use flightsurety_crypto::sha256_multiple;
use parking_lot::Mutex;
use rand::{rngs::OsRng, Rng};
use std::collections::VecDeque;

/// Draws above this many for one assignment mean the source is stuck
const MAX_DRAWS: usize = 1024;

/// Source of watch indexes.
///
/// Implementations return an integer in `[0, max_index)` that callers cannot
/// predict ahead of the call.
pub trait IndexSource: Send + Sync {
    fn next_index(&self, caller: &Address, now: Timestamp, max_index: u8) -> u8;
}

/// Hash-of-nonce index source.
///
/// Mixes an advancing nonce, the clock and the caller. Anyone who knows the
/// nonce and the clock can predict the result; use [`OsRngIndexSource`] for
/// real deployments.
pub struct WeakIndexSource {
    nonce: Mutex<u8>,
    wrap: u8,
}

impl WeakIndexSource {
    pub fn new(wrap: u8) -> Self {
        Self {
            nonce: Mutex::new(0),
            wrap: wrap.max(1),
        }
    }

    fn advance(&self) -> u8 {
        let mut nonce = self.nonce.lock();
        let current = *nonce;
        *nonce = if current + 1 >= self.wrap { 0 } else { current + 1 };
        current
    }
}

impl IndexSource for WeakIndexSource {
    fn next_index(&self, caller: &Address, now: Timestamp, max_index: u8) -> u8 {
        let nonce = self.advance();
        let digest = sha256_multiple(&[
            &[nonce],
            &now.as_millis().to_le_bytes(),
            caller.as_bytes(),
        ]);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_be_bytes(head) % max_index as u64) as u8
    }
}

/// Index source backed by the operating system RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngIndexSource;

impl IndexSource for OsRngIndexSource {
    fn next_index(&self, _caller: &Address, _now: Timestamp, max_index: u8) -> u8 {
        OsRng.gen_range(0..max_index)
    }
}

/// Replays a fixed sequence of indexes, cycling when exhausted
pub struct ScriptedIndexSource {
    script: Vec<u8>,
    queue: Mutex<VecDeque<u8>>,
}

impl ScriptedIndexSource {
    pub fn new(script: impl Into<Vec<u8>>) -> Self {
        let script = script.into();
        Self {
            queue: Mutex::new(script.iter().copied().collect()),
            script,
        }
    }
}

impl IndexSource for ScriptedIndexSource {
    fn next_index(&self, _caller: &Address, _now: Timestamp, max_index: u8) -> u8 {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            queue.extend(self.script.iter().copied());
        }
        queue.pop_front().unwrap_or(0) % max_index
    }
}

/// Draw three pairwise-distinct indexes, redrawing on collision
pub fn assign_indexes(
    source: &dyn IndexSource,
    caller: &Address,
    now: Timestamp,
    max_index: u8,
) -> SuretyResult<[u8; 3]> {
    if max_index < 3 {
        return Err(SuretyError::ConfigError(format!(
            "max_index {} cannot hold three distinct indexes",
            max_index
        )));
    }

    let mut drawn: Vec<u8> = Vec::with_capacity(3);
    for _ in 0..MAX_DRAWS {
        let index = source.next_index(caller, now, max_index);
        if !drawn.contains(&index) {
            drawn.push(index);
            if drawn.len() == 3 {
                return Ok([drawn[0], drawn[1], drawn[2]]);
            }
        }
    }

    Err(SuretyError::Internal(
        "index source failed to produce three distinct indexes".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_source_stays_in_range() {
        let source = WeakIndexSource::new(250);
        let caller = Address([4u8; 32]);
        for i in 0..600 {
            let index = source.next_index(&caller, Timestamp::from_millis(i), 10);
            assert!(index < 10);
        }
    }

    #[test]
    fn test_weak_nonce_wraps() {
        let source = WeakIndexSource::new(3);
        let seen: Vec<u8> = (0..7).map(|_| source.advance()).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_assign_redraws_collisions() {
        let source = ScriptedIndexSource::new(vec![4, 4, 7, 4, 7, 2]);
        let indexes = assign_indexes(&source, &Address::ZERO, Timestamp::from_millis(0), 10).unwrap();
        assert_eq!(indexes, [4, 7, 2]);
    }

    #[test]
    fn test_assign_always_distinct() {
        let caller = Address([8u8; 32]);
        for source in [
            Box::new(WeakIndexSource::new(250)) as Box<dyn IndexSource>,
            Box::new(OsRngIndexSource),
        ] {
            for i in 0..50 {
                let [a, b, c] =
                    assign_indexes(source.as_ref(), &caller, Timestamp::from_millis(i), 3).unwrap();
                assert!(a != b && b != c && a != c);
                assert!(a < 3 && b < 3 && c < 3);
            }
        }
    }

    #[test]
    fn test_stuck_source_errors() {
        let source = ScriptedIndexSource::new(vec![5]);
        let result = assign_indexes(&source, &Address::ZERO, Timestamp::from_millis(0), 10);
        assert!(matches!(result, Err(SuretyError::Internal(_))));
    }
}
