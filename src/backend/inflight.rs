use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::queue::PendingQueue;

/// Identifies one fetch attempt, so a late outcome from an older attempt
/// cannot settle a newer one for the same position.
pub type FetchId = u64;

struct InFlightFetch {
    id: FetchId,
    token: CancellationToken,
}

/// Cancellation handles of the fetches currently holding a concurrency slot.
///
/// A fetch keeps its slot until its outcome is settled, even after being
/// cancelled, so the slot count never exceeds the cap.
#[derive(Default)]
pub struct InFlight {
    fetches: HashMap<usize, InFlightFetch>,
    next_id: FetchId,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, position: usize) -> (FetchId, CancellationToken) {
        let id = self.next_id;
        self.next_id += 1;
        let token = CancellationToken::new();
        self.fetches.insert(
            position,
            InFlightFetch {
                id,
                token: token.clone(),
            },
        );
        (id, token)
    }

    /// Releases the slot held by fetch `id` for `position`.
    /// Returns `false` for unknown or superseded attempts.
    pub fn settle(&mut self, position: usize, id: FetchId) -> bool {
        match self.fetches.get(&position) {
            Some(fetch) if fetch.id == id => {
                self.fetches.remove(&position);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.fetches.contains_key(&position)
    }

    #[cfg(test)]
    pub fn is_cancelled(&self, position: usize) -> bool {
        self.fetches
            .get(&position)
            .is_some_and(|fetch| fetch.token.is_cancelled())
    }

    pub fn len(&self) -> usize {
        self.fetches.len()
    }

    /// Cancels in-flight fetches that fell out of the `cap` most wanted
    /// positions around `target`.
    ///
    /// The wanted set is the first `cap` positions of the merged order of
    /// live in-flight fetches and the pending queue, by distance to `target`.
    /// At equal distance an in-flight fetch beats a pending one. The fetch for
    /// `target` itself is never cancelled, and neither is one that is
    /// already cancelled. Returns the positions that were cancelled.
    pub fn prune_irrelevant(
        &mut self,
        target: usize,
        pending: &PendingQueue,
        cap: usize,
    ) -> Vec<usize> {
        let mut candidates: Vec<(usize, bool, usize)> = self
            .fetches
            .iter()
            .filter(|(_, fetch)| !fetch.token.is_cancelled())
            .map(|(&position, _)| (position.abs_diff(target), false, position))
            .chain(
                pending
                    .iter()
                    .take(cap)
                    .map(|position| (position.abs_diff(target), true, position)),
            )
            .collect();
        candidates.sort_unstable();

        let mut cancelled = Vec::new();
        for &(_, is_pending, position) in candidates.iter().skip(cap) {
            if is_pending || position == target {
                continue;
            }
            if let Some(fetch) = self.fetches.get(&position) {
                fetch.token.cancel();
                cancelled.push(position);
            }
        }
        cancelled
    }

    pub fn cancel_all(&self) -> usize {
        for fetch in self.fetches.values() {
            fetch.token.cancel();
        }
        self.fetches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_without(len: usize, target: usize, taken: &[usize]) -> PendingQueue {
        let mut queue = PendingQueue::with_all(len, target);
        let mut kept = Vec::new();
        while let Some(position) = queue.take_next() {
            if !taken.contains(&position) {
                kept.push(position);
            }
        }
        for position in kept {
            queue.requeue(position);
        }
        queue
    }

    #[test]
    fn test_register_and_settle() {
        let mut in_flight = InFlight::new();
        let (id, token) = in_flight.register(4);
        assert!(in_flight.contains(4));
        assert!(!token.is_cancelled());

        assert!(!in_flight.settle(4, id + 1));
        assert!(in_flight.settle(4, id));
        assert!(!in_flight.settle(4, id));
        assert_eq!(in_flight.len(), 0);
    }

    #[test]
    fn test_prune_cancels_far_fetches_after_jump() {
        let mut in_flight = InFlight::new();
        let (_, far) = in_flight.register(3);
        let (_, farther) = in_flight.register(2);
        let mut pending = pending_without(5, 4, &[4, 3, 2]);
        pending.reprioritize(0);

        let mut cancelled = in_flight.prune_irrelevant(0, &pending, 2);
        cancelled.sort();
        assert_eq!(cancelled, vec![2, 3]);
        assert!(far.is_cancelled());
        assert!(farther.is_cancelled());
        // Cancelled fetches keep their slot until settled.
        assert_eq!(in_flight.len(), 2);
    }

    #[test]
    fn test_prune_keeps_fetches_still_in_top_cap() {
        let mut in_flight = InFlight::new();
        let (_, near) = in_flight.register(5);
        let (_, far) = in_flight.register(9);
        let mut pending = pending_without(10, 9, &[9, 5]);
        pending.reprioritize(4);

        let cancelled = in_flight.prune_irrelevant(4, &pending, 2);
        assert_eq!(cancelled, vec![9]);
        assert!(!near.is_cancelled());
        assert!(far.is_cancelled());
    }

    #[test]
    fn test_prune_never_cancels_target() {
        let mut in_flight = InFlight::new();
        let (_, token) = in_flight.register(2);
        let mut pending = pending_without(5, 2, &[2]);
        pending.reprioritize(2);

        assert!(in_flight.prune_irrelevant(2, &pending, 1).is_empty());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_prune_does_not_double_cancel() {
        let mut in_flight = InFlight::new();
        in_flight.register(0);
        let mut pending = pending_without(10, 0, &[0]);
        pending.reprioritize(9);

        assert_eq!(in_flight.prune_irrelevant(9, &pending, 1), vec![0]);
        assert!(in_flight.prune_irrelevant(9, &pending, 1).is_empty());
        assert!(in_flight.is_cancelled(0));
    }

    #[test]
    fn test_equal_distance_prefers_in_flight() {
        let mut in_flight = InFlight::new();
        let (_, token) = in_flight.register(3);
        let mut pending = pending_without(7, 3, &[3]);
        pending.reprioritize(2);

        // 1 (pending) and 3 (in flight) are both one away from 2.
        assert!(in_flight.prune_irrelevant(2, &pending, 2).is_empty());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_all() {
        let mut in_flight = InFlight::new();
        let (_, a) = in_flight.register(0);
        let (_, b) = in_flight.register(1);
        assert_eq!(in_flight.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
