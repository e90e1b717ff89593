//! Fixed-capacity ring buffer owned by one compiled processor.
//!
//! A [`Memory`] retains the last `capacity` values pushed into it, oldest first.
//! Pushing past capacity evicts the oldest entry. It is only ever touched by its
//! owning node's loop, so it carries no synchronization.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// The last `N` values of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory<T> {
  capacity: NonZeroUsize,
  values: VecDeque<T>,
}

impl<T> Memory<T> {
  /// Creates an empty buffer holding at most `capacity` values.
  pub fn new(capacity: NonZeroUsize) -> Self {
    Self {
      capacity,
      values: VecDeque::with_capacity(capacity.get()),
    }
  }

  /// Appends `value`, returning the evicted oldest value when the buffer was full.
  pub fn push(&mut self, value: T) -> Option<T> {
    let evicted = if self.values.len() == self.capacity.get() {
      self.values.pop_front()
    } else {
      None
    };
    self.values.push_back(value);
    evicted
  }

  /// Maximum number of retained values.
  pub fn capacity(&self) -> usize {
    self.capacity.get()
  }

  /// Number of retained values.
  pub fn len(&self) -> usize {
    self.values.len()
  }

  /// True when nothing has been pushed yet.
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// True once `capacity` values are retained.
  pub fn is_full(&self) -> bool {
    self.values.len() == self.capacity.get()
  }

  /// Oldest retained value.
  pub fn oldest(&self) -> Option<&T> {
    self.values.front()
  }

  /// Most recently pushed value.
  pub fn newest(&self) -> Option<&T> {
    self.values.back()
  }

  /// Retained values, oldest to newest.
  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
    self.values.iter()
  }

  /// Drops every retained value.
  pub fn clear(&mut self) {
    self.values.clear();
  }
}

impl Memory<f64> {
  /// Arithmetic mean of the retained values, `None` when empty.
  pub fn mean(&self) -> Option<f64> {
    if self.values.is_empty() {
      return None;
    }
    Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
  }
}
