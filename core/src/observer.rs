//! Capability traits used to notify consumers without a shared base type.
//!
//! Subjects keep explicit registration lists of weak references, so a
//! subject never extends the lifetime of the components observing it.
//! Observers are invoked while the subject is mutably borrowed by its caller;
//! an observer must not borrow the subject that is notifying it.

use std::{cell::RefCell, rc::Weak};

use crate::TileCoord;

/// Zero-argument "something changed, recompute" notification.
pub trait Observer {
    /// Invoked after the observed subject changed.
    fn update(&mut self);
}

/// Notification carrying the tile that a structure vacated.
pub trait MapObserver {
    /// Invoked once when the structure occupying `tile` is destroyed.
    fn update(&mut self, tile: TileCoord);
}

/// Registration list of weakly referenced observers.
///
/// Registration deduplicates by identity, so registering the same observer
/// twice never produces a double notification.
pub struct ObserverList<T: ?Sized> {
    observers: Vec<Weak<RefCell<T>>>,
}

impl<T: ?Sized> ObserverList<T> {
    /// Creates an empty registration list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Registers `observer`, returning `false` if it was already present.
    pub fn register(&mut self, observer: Weak<RefCell<T>>) -> bool {
        if self
            .observers
            .iter()
            .any(|existing| Weak::ptr_eq(existing, &observer))
        {
            return false;
        }
        self.observers.push(observer);
        true
    }

    /// Removes `observer`, returning whether it was registered.
    pub fn deregister(&mut self, observer: &Weak<RefCell<T>>) -> bool {
        let before = self.observers.len();
        self.observers
            .retain(|existing| !Weak::ptr_eq(existing, observer));
        self.observers.len() != before
    }

    /// Number of registrations, including observers that were dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Reports whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Drops every registration.
    pub fn clear(&mut self) {
        self.observers.clear();
    }

    /// Calls `notify` once for every live observer and prunes dropped ones.
    ///
    /// Returns the number of observers that were notified.
    pub fn notify_with<F>(&mut self, mut notify: F) -> usize
    where
        F: FnMut(&mut T),
    {
        let mut notified = 0;
        self.observers.retain(|weak| {
            let Some(observer) = weak.upgrade() else {
                return false;
            };
            match observer.try_borrow_mut() {
                Ok(mut observer) => {
                    notify(&mut *observer);
                    notified += 1;
                }
                Err(_) => {
                    log::error!("observer is already borrowed; notification skipped");
                }
            }
            true
        });
        notified
    }
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("registered", &self.observers.len())
            .finish()
    }
}

impl ObserverList<dyn Observer> {
    /// Notifies every live observer that the subject changed.
    pub fn notify(&mut self) -> usize {
        self.notify_with(|observer| observer.update())
    }
}

impl ObserverList<dyn MapObserver> {
    /// Notifies every live observer that `tile` was vacated.
    pub fn notify(&mut self, tile: TileCoord) -> usize {
        self.notify_with(|observer| observer.update(tile))
    }
}
