//! Small assertion helpers shared across seed-test scenarios.

use crate::types::{ChainEvent, ChainEventKind};

/// Assert an event list contains exactly one `EscrowLocked` for `hashlock`.
pub fn assert_single_lock(events: &[ChainEvent], hashlock: [u8; 32]) {
    let matches: Vec<_> = events
        .iter()
        .filter(|e| e.hashlock == hashlock && matches!(e.kind, ChainEventKind::EscrowLocked { .. }))
        .collect();
    assert_eq!(
        matches.len(),
        1,
        "expected exactly one lock event for hashlock, found {}",
        matches.len()
    );
}

/// Assert a secret reveal never appears more than once for the same hashlock.
pub fn assert_at_most_one_reveal(events: &[ChainEvent], hashlock: [u8; 32]) {
    let reveals = events
        .iter()
        .filter(|e| e.hashlock == hashlock && matches!(e.kind, ChainEventKind::SecretRevealed { .. }))
        .count();
    assert!(reveals <= 1, "hashlock revealed {reveals} times, expected at most 1");
}

/// Extract the revealed preimage for `hashlock`, if any.
pub fn find_revealed_preimage(events: &[ChainEvent], hashlock: [u8; 32]) -> Option<[u8; 32]> {
    events.iter().find_map(|e| {
        if e.hashlock != hashlock {
            return None;
        }
        match e.kind {
            ChainEventKind::SecretRevealed { preimage } => Some(preimage),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainTag;

    #[test]
    fn test_find_revealed_preimage() {
        let hashlock = [7u8; 32];
        let preimage = [9u8; 32];
        let events = vec![ChainEvent {
            chain: ChainTag::Source,
            height: 1,
            log_index: 0,
            hashlock,
            kind: ChainEventKind::SecretRevealed { preimage },
        }];
        assert_eq!(find_revealed_preimage(&events, hashlock), Some(preimage));
    }
}
