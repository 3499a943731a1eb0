//! Role containers
//!
//! A [`Singleton`] holds the occupant of one role. Replacing the occupant
//! yields a [`Transition`] that the owner dispatches in one place, so every
//! role side effect (ending, loading, starting a slot) lives in a single
//! match. [`Collection`] is the unordered bag of draining slots.

/// Occupant change of a [`Singleton`]
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    pub removed: Option<T>,
    pub added: Option<T>,
}

impl<T> Transition<T> {
    fn none() -> Self {
        Self {
            removed: None,
            added: None,
        }
    }

    /// True when the role kept its occupant
    pub fn is_empty(&self) -> bool {
        self.removed.is_none() && self.added.is_none()
    }
}

/// Holds at most one value
#[derive(Debug, Clone)]
pub struct Singleton<T> {
    value: Option<T>,
}

impl<T> Default for Singleton<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: Clone + PartialEq> Singleton<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Replace the occupant. Setting the current occupant again is a no-op
    /// and yields an empty transition.
    pub fn set(&mut self, value: Option<T>) -> Transition<T> {
        if self.value == value {
            return Transition::none();
        }
        let removed = std::mem::replace(&mut self.value, value.clone());
        Transition {
            removed,
            added: value,
        }
    }

    /// Take the occupant out without a transition; used when it is handed
    /// to another role rather than discarded.
    pub fn clear(&mut self) -> Option<T> {
        self.value.take()
    }

    /// Whether `value` is the current occupant
    pub fn holds(&self, value: &T) -> bool {
        self.value.as_ref() == Some(value)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

/// Unordered bag
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: PartialEq> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `item`; returns false if it was already there
    pub fn add(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Remove `item`; returns whether it was there
    pub fn remove(&mut self, item: &T) -> bool {
        match self.items.iter().position(|i| i == item) {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
