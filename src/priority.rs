//! Priority definitions and helpers shared by the queue, dispatcher, and metrics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Request priority classes ordered from most to least urgent.
///
/// The set is fixed so the queue and metrics can rely on stable integer indexes
/// instead of branching on specific labels. Adding a class only requires
/// appending it to [`Priority::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Ordered list of all priorities (most urgent first) for iteration utilities.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Stable index for priority based arrays.
    pub const fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Numeric urgency as carried by requests on the wire: higher means more
    /// urgent. The queue orders its head by this value.
    ///
    /// # Mapping
    /// - `High` → 3
    /// - `Medium` → 2
    /// - `Low` → 1
    pub const fn urgency(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{label}")
    }
}

/// Helper structure wrapping a value per [`Priority`].
///
/// Keeps per-class state (counters, quotas) stable when new priorities are
/// introduced: as long as [`Priority::ALL`] is updated, the table grows and all
/// call sites iterate dynamically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable<T> {
    values: Vec<T>,
}

impl<T> PriorityTable<T> {
    /// Build a table by executing a closure for each priority, in
    /// [`Priority::ALL`] order.
    pub fn from_fn(mut f: impl FnMut(Priority) -> T) -> Self {
        let mut values = Vec::with_capacity(Priority::ALL.len());
        for priority in Priority::ALL {
            values.push(f(priority));
        }
        PriorityTable { values }
    }

    /// Borrow the value for a given priority.
    pub fn get(&self, priority: Priority) -> &T {
        &self.values[priority.index()]
    }

    /// Mutably borrow the value for a given priority.
    pub fn get_mut(&mut self, priority: Priority) -> &mut T {
        &mut self.values[priority.index()]
    }

    /// Iterate `(priority, value)` pairs in [`Priority::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Priority, &T)> {
        Priority::ALL.iter().copied().zip(self.values.iter())
    }
}

impl<T> Index<Priority> for PriorityTable<T> {
    type Output = T;

    fn index(&self, index: Priority) -> &Self::Output {
        self.get(index)
    }
}

impl<T> IndexMut<Priority> for PriorityTable<T> {
    fn index_mut(&mut self, index: Priority) -> &mut Self::Output {
        self.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_index_is_stable() {
        assert_eq!(Priority::High.index(), 0);
        assert_eq!(Priority::Medium.index(), 1);
        assert_eq!(Priority::Low.index(), 2);
    }

    #[test]
    fn urgency_orders_high_above_low() {
        assert!(Priority::High.urgency() > Priority::Medium.urgency());
        assert!(Priority::Medium.urgency() > Priority::Low.urgency());
    }

    #[test]
    fn priority_table_builds_and_indexes() {
        let table = PriorityTable::from_fn(|p| p.index());
        assert_eq!(table[Priority::High], 0);
        assert_eq!(table[Priority::Low], 2);
    }

    #[test]
    fn priority_serializes_as_variant_name() {
        let json = serde_json::to_string(&Priority::Medium).expect("serialize priority");
        assert_eq!(json, "\"Medium\"");
    }
}
