//! Bounded, pollable histories.
//!
//! A history keeps the newest `capacity` items and a cursor marking how far
//! the consumer has polled. Evicting from the front shifts the cursor with the
//! items, so polling never replays or skips an item that is still retained.

use exchange::InstrumentId;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    capacity: usize,
    items: VecDeque<T>,
    polled_index: usize,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
            polled_index: 0,
        }
    }

    pub fn append(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
            self.polled_index = self.polled_index.saturating_sub(1);
        }
    }

    /// Items appended since the previous poll, oldest first.
    pub fn poll_new(&mut self) -> Vec<T> {
        let new = self.items.iter().skip(self.polled_index).cloned().collect();
        self.polled_index = self.items.len();
        new
    }

    /// Every retained item, oldest first. Does not move the cursor.
    pub fn history(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.polled_index = 0;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items the next poll would return.
    pub fn unpolled(&self) -> usize {
        self.items.len() - self.polled_index
    }
}

/// One [`BoundedHistory`] per instrument, created on first use.
#[derive(Debug, Clone)]
pub struct HistoryBook<T> {
    capacity: usize,
    by_instrument: HashMap<InstrumentId, BoundedHistory<T>>,
}

impl<T: Clone> HistoryBook<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            by_instrument: HashMap::new(),
        }
    }

    pub fn append(&mut self, instrument_id: &str, item: T) {
        let capacity = self.capacity;
        self.by_instrument
            .entry(instrument_id.to_string())
            .or_insert_with(|| BoundedHistory::new(capacity))
            .append(item);
    }

    pub fn poll_new(&mut self, instrument_id: &str) -> Vec<T> {
        self.by_instrument
            .get_mut(instrument_id)
            .map(BoundedHistory::poll_new)
            .unwrap_or_default()
    }

    /// New items of every instrument that has any.
    pub fn poll_all_new(&mut self) -> HashMap<InstrumentId, Vec<T>> {
        self.by_instrument
            .iter_mut()
            .filter(|(_, history)| history.unpolled() > 0)
            .map(|(id, history)| (id.clone(), history.poll_new()))
            .collect()
    }

    pub fn history(&self, instrument_id: &str) -> Vec<T> {
        self.by_instrument
            .get(instrument_id)
            .map(BoundedHistory::history)
            .unwrap_or_default()
    }

    pub fn all_history(&self) -> HashMap<InstrumentId, Vec<T>> {
        self.by_instrument
            .iter()
            .map(|(id, history)| (id.clone(), history.history()))
            .collect()
    }

    pub fn clear(&mut self, instrument_id: &str) {
        if let Some(history) = self.by_instrument.get_mut(instrument_id) {
            history.clear();
        }
    }

    pub fn clear_all(&mut self) {
        self.by_instrument.clear();
    }

    pub fn len(&self, instrument_id: &str) -> usize {
        self.by_instrument
            .get(instrument_id)
            .map_or(0, BoundedHistory::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_returns_each_item_once() {
        let mut history = BoundedHistory::new(10);
        history.append(1);
        history.append(2);
        assert_eq!(history.poll_new(), vec![1, 2]);
        assert_eq!(history.poll_new(), Vec::<i32>::new());

        history.append(3);
        assert_eq!(history.poll_new(), vec![3]);
        assert_eq!(history.history(), vec![1, 2, 3]);
    }

    #[test]
    fn test_eviction_keeps_cursor_aligned() {
        let mut history = BoundedHistory::new(3);
        for i in 0..3 {
            history.append(i);
        }
        assert_eq!(history.poll_new(), vec![0, 1, 2]);

        // Two more push out 0 and 1; only the new ones are unpolled.
        history.append(3);
        history.append(4);
        assert_eq!(history.history(), vec![2, 3, 4]);
        assert_eq!(history.unpolled(), 2);
        assert_eq!(history.poll_new(), vec![3, 4]);
    }

    #[test]
    fn test_cursor_floors_at_zero() {
        let mut history = BoundedHistory::new(2);
        history.append('a');
        assert_eq!(history.poll_new(), vec!['a']);

        for c in ['b', 'c', 'd', 'e'] {
            history.append(c);
        }
        // Unpolled items that were evicted are lost, the rest are returned.
        assert_eq!(history.poll_new(), vec!['d', 'e']);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut history = BoundedHistory::new(5);
        history.append(1);
        history.poll_new();
        history.clear();
        assert!(history.is_empty());

        history.append(2);
        assert_eq!(history.poll_new(), vec![2]);
    }

    #[test]
    fn test_book_is_per_instrument() {
        let mut book = HistoryBook::new(2);
        book.append("ASML", 1);
        book.append("ASML", 2);
        book.append("ASML", 3);
        book.append("PHILIPS", 10);

        assert_eq!(book.history("ASML"), vec![2, 3]);
        assert_eq!(book.poll_new("PHILIPS"), vec![10]);
        assert_eq!(book.poll_new("UNKNOWN"), Vec::<i32>::new());

        let pending = book.poll_all_new();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending["ASML"], vec![2, 3]);

        book.clear_all();
        assert_eq!(book.len("ASML"), 0);
    }
}
