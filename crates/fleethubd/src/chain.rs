//! Priority-ordered capability chains.
//!
//! A [`PriorityChain`] keeps `(item, priority)` pairs sorted after every
//! insertion and walks them front-to-back until a stop rule fires. The
//! authenticator and handler subsystems instantiate it with opposite sort
//! directions and different stop rules and defaults.

use std::cmp::Ordering;

/// Outcome reported by authenticators and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleCode {
    /// Fully handled; the response has already been sent.
    Ok,
    /// Fatal for this call; stop without trying further candidates.
    Fail,
    /// This capability cannot process the input and sent nothing.
    Declined,
}

impl HandleCode {
    /// Returns `true` for [`HandleCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns `true` for [`HandleCode::Ok`] and [`HandleCode::Fail`].
    #[must_use]
    pub const fn is_definitive(self) -> bool {
        matches!(self, Self::Ok | Self::Fail)
    }
}

/// Direction in which a chain is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOrder {
    /// Lower priority numbers run first.
    Ascending,
    /// Higher priority numbers run first.
    Descending,
}

impl ChainOrder {
    fn compare(self, left: i32, right: i32) -> Ordering {
        match self {
            Self::Ascending => left.cmp(&right),
            Self::Descending => right.cmp(&left),
        }
    }
}

/// A capability paired with its priority.
#[derive(Debug, Clone)]
pub struct ChainItem<T> {
    item: T,
    priority: i32,
}

impl<T> ChainItem<T> {
    /// The wrapped capability.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// The priority the capability was pushed with.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Ordered list of capabilities evaluated with a short-circuit stop rule.
#[derive(Debug, Clone)]
pub struct PriorityChain<T> {
    order: ChainOrder,
    items: Vec<ChainItem<T>>,
}

impl<T> PriorityChain<T> {
    /// Creates an empty chain sorted in the given direction.
    #[must_use]
    pub fn new(order: ChainOrder) -> Self {
        Self {
            order,
            items: Vec::new(),
        }
    }

    /// Inserts a capability and re-sorts the chain.
    ///
    /// The sort is stable, so capabilities sharing a priority keep their
    /// insertion order.
    pub fn push(&mut self, item: T, priority: i32) {
        self.items.push(ChainItem { item, priority });
        let order = self.order;
        self.items
            .sort_by(|left, right| order.compare(left.priority, right.priority));
    }

    /// Number of capabilities in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the chain holds no capabilities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates the capabilities in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainItem<T>> {
        self.items.iter()
    }

    /// Invokes capabilities in order until `stop` accepts a result.
    ///
    /// Returns the result that stopped the walk, the last result produced
    /// when the chain is exhausted, or `default` when the chain is empty.
    pub fn iterate<F, S>(&self, default: HandleCode, stop: S, mut invoke: F) -> HandleCode
    where
        F: FnMut(&T) -> HandleCode,
        S: Fn(HandleCode) -> bool,
    {
        let mut result = default;
        for entry in &self.items {
            result = invoke(&entry.item);
            if stop(result) {
                break;
            }
        }
        result
    }
}
