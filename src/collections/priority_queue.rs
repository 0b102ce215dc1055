//! Keyed binary min-heap.
//!
//! Elements are ranked by a caller-supplied priority function (lower values
//! are dequeued first) and de-duplicated by a caller-supplied key function.
//! A side table of queued keys makes membership tests O(1) and is kept
//! independent of heap positions, so reordering never touches it.

use std::collections::HashSet;
use std::fmt;

use crate::error::QueueError;

/// Priority value that removes an element from consideration.
///
/// `enqueue` refuses elements with this priority and `reprioritize` drops
/// queued elements whose priority becomes `DROP`.
pub const DROP: f64 = f64::INFINITY;

/// Computes an element's priority. Lower values are dequeued first.
pub type PriorityFunction<T> = Box<dyn Fn(&T) -> f64 + Send + Sync>;

/// Maps an element to the unique key used for de-duplication.
pub type KeyFunction<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Binary min-heap with key-based de-duplication.
///
/// `elements[i]` and `priorities[i]` always describe the same entry, and
/// `priorities[parent(i)] <= priorities[i]` holds for every `i > 0`.
/// Equal priorities are dequeued in no particular order.
///
/// # Example
///
/// ```
/// use tile_supply::collections::PriorityQueue;
///
/// let mut queue = PriorityQueue::new(|e: &(char, f64)| e.1, |e: &(char, f64)| e.0.to_string());
/// queue.enqueue(('a', 5.0));
/// queue.enqueue(('b', 1.0));
/// assert!(!queue.enqueue(('b', 0.0)));
///
/// assert_eq!(queue.dequeue().unwrap().0, 'b');
/// ```
pub struct PriorityQueue<T> {
    priority_function: PriorityFunction<T>,
    key_function: KeyFunction<T>,
    elements: Vec<T>,
    priorities: Vec<f64>,
    queued_elements: HashSet<String>,
}

impl<T> PriorityQueue<T> {
    /// Create an empty queue.
    ///
    /// # Arguments
    /// * `priority_function` - Ranks an element; return [`DROP`] to reject it
    /// * `key_function` - Unique key of an element, used to refuse duplicates
    pub fn new<P, K>(priority_function: P, key_function: K) -> Self
    where
        P: Fn(&T) -> f64 + Send + Sync + 'static,
        K: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            priority_function: Box::new(priority_function),
            key_function: Box::new(key_function),
            elements: Vec::new(),
            priorities: Vec::new(),
            queued_elements: HashSet::new(),
        }
    }

    /// Add an element to the queue.
    ///
    /// Returns `false` without touching the queue if an element with the same
    /// key is already queued or if the element's priority is [`DROP`].
    pub fn enqueue(&mut self, element: T) -> bool {
        let key = (self.key_function)(&element);
        if self.queued_elements.contains(&key) {
            return false;
        }

        let priority = (self.priority_function)(&element);
        if priority == DROP {
            return false;
        }

        self.elements.push(element);
        self.priorities.push(priority);
        self.queued_elements.insert(key);
        self.sift_up(self.elements.len() - 1);
        true
    }

    /// Remove and return the element with the lowest priority value.
    ///
    /// Callers are expected to check [`is_empty`](Self::is_empty) first;
    /// an empty queue is reported as [`QueueError::Empty`].
    pub fn dequeue(&mut self) -> Result<T, QueueError> {
        if self.elements.is_empty() {
            return Err(QueueError::Empty);
        }

        // swap_remove moves the last entry into the root slot
        let element = self.elements.swap_remove(0);
        self.priorities.swap_remove(0);
        if !self.elements.is_empty() {
            self.sift_down(0);
        }

        let key = (self.key_function)(&element);
        self.queued_elements.remove(&key);
        Ok(element)
    }

    /// Whether an element with the same key as `element` is queued.
    pub fn is_queued(&self, element: &T) -> bool {
        self.is_key_queued(&(self.key_function)(element))
    }

    /// Whether an element with this key is queued.
    pub fn is_key_queued(&self, key: &str) -> bool {
        self.queued_elements.contains(key)
    }

    /// Recompute every priority and restore heap order.
    ///
    /// Membership is preserved except for elements whose new priority is
    /// [`DROP`], which are removed.
    pub fn reprioritize(&mut self) {
        let elements = std::mem::take(&mut self.elements);
        self.priorities.clear();

        for element in elements {
            let priority = (self.priority_function)(&element);
            if priority == DROP {
                let key = (self.key_function)(&element);
                self.queued_elements.remove(&key);
            } else {
                self.elements.push(element);
                self.priorities.push(priority);
            }
        }

        self.heapify();
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.priorities.clear();
        self.queued_elements.clear();
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the queue holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Priority value of the element that would be dequeued next.
    pub fn peek_priority(&self) -> Option<f64> {
        self.priorities.first().copied()
    }

    /// Queued elements in heap order, not priority order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    #[inline]
    fn parent(index: usize) -> usize {
        (index - 1) / 2
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.elements.swap(a, b);
        self.priorities.swap(a, b);
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = Self::parent(index);
            if self.priorities[index] < self.priorities[parent] {
                self.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let count = self.elements.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < count && self.priorities[left] < self.priorities[smallest] {
                smallest = left;
            }
            if right < count && self.priorities[right] < self.priorities[smallest] {
                smallest = right;
            }
            if smallest == index {
                break;
            }

            self.swap(index, smallest);
            index = smallest;
        }
    }

    fn heapify(&mut self) {
        for index in (0..self.elements.len() / 2).rev() {
            self.sift_down(index);
        }
    }
}

impl<T> fmt::Debug for PriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("len", &self.elements.len())
            .field("priorities", &self.priorities)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
