//! Work queue
//!
//! Ordered entries still to be written. Draining only ever takes from the
//! front; the two permitted reorderings (sequence expansion and future
//! resolution) both splice at the front, so relative order is preserved.

use std::collections::VecDeque;

use crate::entry::Interpolation;

#[derive(Debug, Default)]
pub struct WorkQueue {
    entries: VecDeque<Interpolation>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interleave literal segments with interpolation slots:
    /// `L0, I0, L1, I1, ..., Ln`.
    pub fn from_template(literals: Vec<String>, interpolations: Vec<Interpolation>) -> Self {
        let mut entries = VecDeque::with_capacity(literals.len() + interpolations.len());
        let mut literals = literals.into_iter();
        if let Some(first) = literals.next() {
            entries.push_back(Interpolation::Text(first));
        }
        for (value, literal) in interpolations.into_iter().zip(literals) {
            entries.push_back(value);
            entries.push_back(Interpolation::Text(literal));
        }
        Self { entries }
    }

    pub fn dequeue(&mut self) -> Option<Interpolation> {
        self.entries.pop_front()
    }

    /// Splice `items` at the front, keeping their order.
    pub fn prepend_sequence(&mut self, items: Vec<Interpolation>) {
        for item in items.into_iter().rev() {
            self.entries.push_front(item);
        }
    }

    pub fn prepend_one(&mut self, value: Interpolation) {
        self.entries.push_front(value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Interpolation> {
        self.entries.iter_mut()
    }

    /// Drop every entry. Returns how many pull-sources were dropped with them.
    pub fn clear(&mut self) -> usize {
        let sources = self.entries.iter().map(Interpolation::source_count).sum();
        self.entries.clear();
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(entry: Option<Interpolation>) -> String {
        match entry {
            Some(Interpolation::Text(t)) => t,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn interleaves_template() {
        let mut queue = WorkQueue::from_template(
            vec!["a ".into(), " c".into()],
            vec![Interpolation::from("b")],
        );
        assert_eq!(queue.len(), 3);
        assert_eq!(text(queue.dequeue()), "a ");
        assert_eq!(text(queue.dequeue()), "b");
        assert_eq!(text(queue.dequeue()), " c");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn prepend_sequence_keeps_order() {
        let mut queue = WorkQueue::from_template(vec!["z".into()], vec![]);
        queue.prepend_sequence(vec!["x".into(), "y".into()]);
        assert_eq!(text(queue.dequeue()), "x");
        assert_eq!(text(queue.dequeue()), "y");
        assert_eq!(text(queue.dequeue()), "z");
    }

    #[test]
    fn new_queue_fills_from_the_front() {
        let mut queue = WorkQueue::new();
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_none());

        queue.prepend_one("b".into());
        queue.prepend_sequence(vec!["a".into()]);
        assert_eq!(queue.len(), 2);
        assert_eq!(text(queue.dequeue()), "a");
        assert_eq!(text(queue.dequeue()), "b");
    }

    #[test]
    fn prepend_one_goes_first() {
        let mut queue = WorkQueue::from_template(vec!["b".into()], vec![]);
        queue.prepend_one("a".into());
        assert_eq!(text(queue.dequeue()), "a");
        assert_eq!(text(queue.dequeue()), "b");
    }

    #[test]
    fn clear_counts_sources() {
        let stream = || {
            Interpolation::stream(futures::stream::empty::<anyhow::Result<bytes::Bytes>>())
        };
        let mut queue = WorkQueue::from_template(
            vec!["".into(), "".into(), "".into()],
            vec![stream(), Interpolation::seq([stream(), "x".into()])],
        );
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
