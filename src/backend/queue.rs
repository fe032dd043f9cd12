use std::collections::{HashSet, VecDeque};

/// Positions waiting for a fetch, ordered by distance to the last target.
///
/// Sorting is stable, so positions at equal distance keep their relative
/// order from before the reprioritization.
#[derive(Debug, Default)]
pub struct PendingQueue {
    order: VecDeque<usize>,
    members: HashSet<usize>,
    target: usize,
}

fn distance(position: usize, target: usize) -> usize {
    position.abs_diff(target)
}

impl PendingQueue {
    /// Queue holding every position in `0..len`, prioritized towards `target`.
    pub fn with_all(len: usize, target: usize) -> Self {
        let mut queue = Self {
            order: (0..len).collect(),
            members: (0..len).collect(),
            target,
        };
        queue.reprioritize(target);
        queue
    }

    pub fn reprioritize(&mut self, target: usize) {
        self.target = target;
        self.order
            .make_contiguous()
            .sort_by_key(|&position| distance(position, target));
    }

    pub fn take_next(&mut self) -> Option<usize> {
        let position = self.order.pop_front()?;
        self.members.remove(&position);
        Some(position)
    }

    /// Puts `position` back at its priority slot for the current target,
    /// behind any already-queued position at the same distance.
    /// Returns `false` if it was already queued.
    pub fn requeue(&mut self, position: usize) -> bool {
        if !self.members.insert(position) {
            return false;
        }
        let d = distance(position, self.target);
        let at = self
            .order
            .partition_point(|&queued| distance(queued, self.target) <= d);
        self.order.insert(at, position);
        true
    }

    #[cfg(test)]
    pub fn contains(&self, position: usize) -> bool {
        self.members.contains(&position)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(queue: &PendingQueue) -> Vec<usize> {
        queue.iter().collect()
    }

    #[test]
    fn test_initial_order_from_last_position() {
        let queue = PendingQueue::with_all(5, 4);
        assert_eq!(order(&queue), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_reprioritize_sorts_by_distance() {
        let mut queue = PendingQueue::with_all(7, 6);
        queue.reprioritize(3);

        let distances: Vec<usize> = queue.iter().map(|p| p.abs_diff(3)).collect();
        let mut sorted = distances.clone();
        sorted.sort();
        assert_eq!(distances, sorted);
        assert_eq!(queue.iter().next(), Some(3));
    }

    #[test]
    fn test_reprioritize_is_idempotent() {
        let mut queue = PendingQueue::with_all(9, 0);
        queue.reprioritize(4);
        let once = order(&queue);
        queue.reprioritize(4);
        assert_eq!(order(&queue), once);
    }

    #[test]
    fn test_take_next_drains_then_signals_empty() {
        let mut queue = PendingQueue::with_all(2, 0);
        assert_eq!(queue.take_next(), Some(0));
        assert_eq!(queue.take_next(), Some(1));
        assert_eq!(queue.take_next(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_lands_at_priority_slot() {
        let mut queue = PendingQueue::with_all(6, 0);
        let first = queue.take_next().unwrap();
        let second = queue.take_next().unwrap();
        assert_eq!((first, second), (0, 1));

        queue.reprioritize(5);
        assert!(queue.requeue(1));
        assert_eq!(order(&queue), vec![5, 4, 3, 2, 1]);
        assert!(queue.requeue(0));
        assert_eq!(order(&queue).last(), Some(&0));
    }

    #[test]
    fn test_requeue_rejects_duplicates() {
        let mut queue = PendingQueue::with_all(3, 0);
        assert!(!queue.requeue(2));
        assert_eq!(queue.len(), 3);

        queue.take_next();
        assert!(queue.requeue(0));
        assert!(!queue.requeue(0));
        assert_eq!(queue.len(), 3);
        assert!(queue.contains(0));
    }

    #[test]
    fn test_empty_sequence() {
        let mut queue = PendingQueue::with_all(0, 0);
        queue.reprioritize(0);
        assert_eq!(queue.take_next(), None);
    }
}
