//! Change-detecting property cells.
//!
//! A [`Property<T>`] stores a value and reports from [`Property::set`] whether
//! the value actually changed. Pairing it with a [`crate::Signal`] gives the
//! "emit only on a real transition" behavior every observable value in the
//! bridge relies on.

use std::fmt;

use parking_lot::RwLock;

/// A reactive property that tracks changes.
///
/// # Example
///
/// ```
/// use mpv_scene_core::Property;
///
/// let paused = Property::new(false);
/// assert!(!paused.set(false));
/// assert!(paused.set(true));
/// assert!(paused.get());
/// ```
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if it changed.
    ///
    /// The caller emits the paired notification when this returns `true`.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&*self.value.read()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_change() {
        let prop = Property::new(1.5_f64);
        assert!(!prop.set(1.5));
        assert!(prop.set(2.0));
        assert_eq!(prop.get(), 2.0);
    }

    #[test]
    fn test_default_starts_at_type_default() {
        let prop = Property::<String>::default();
        assert!(!prop.set(String::new()));
        assert!(prop.set("a.mkv".into()));
    }
}
