//! A marker trait for cheap, reference-counted clones.
//!
//! Plain `Clone` makes no promise about cost: cloning a `Vec` copies its
//! contents, cloning an `Rc` just bumps a counter. Actor state is passed
//! around by `Rc`/`Weak` pairs constantly, so call sites want to say "clone
//! the handle, not the data" and have that be checked, not just assumed.

use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;
use std::sync::Arc;

/// Implemented by types whose `clone` is O(1) and shares underlying state
/// with the original (reference counting, interior mutability, or both).
pub trait CloneRef: Clone {
    /// Clone this value, sharing the underlying state with the original.
    fn clone_ref(&self) -> Self;
}

impl<T: ?Sized> CloneRef for Rc<T> {
    fn clone_ref(&self) -> Self {
        Rc::clone(self)
    }
}

impl<T: ?Sized> CloneRef for Weak<T> {
    fn clone_ref(&self) -> Self {
        Weak::clone(self)
    }
}

impl<T: ?Sized> CloneRef for Arc<T> {
    fn clone_ref(&self) -> Self {
        Arc::clone(self)
    }
}

impl<T: CloneRef> CloneRef for Option<T> {
    fn clone_ref(&self) -> Self {
        self.as_ref().map(CloneRef::clone_ref)
    }
}

impl CloneRef for () {
    fn clone_ref(&self) -> Self {}
}

/// Convenience so `Rc<RefCell<T>>`-shaped handles can still be spelled out
/// explicitly where the extra indirection is worth documenting at the call
/// site.
pub type Shared<T> = Rc<RefCell<T>>;

/// Create a new `Shared<T>`.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}
