//! Shared future type aliases.
//!
//! The runtime's public APIs return boxed, locally-runnable futures rather
//! than exposing `impl Future` or requiring callers to name opaque types;
//! command handlers are virtual-dispatched through trait objects (the
//! `ContextActor` is addressed through a handle, not a concrete type) so the
//! futures they return need to be boxed at that boundary anyway.

use std::future::Future;
use std::pin::Pin;

/// A boxed future, borrowing for at most `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A boxed future with no borrowed data, usable from anywhere.
pub type StaticBoxFuture<T> = Pin<Box<dyn Future<Output = T> + 'static>>;

/// Wrap an already-available value in a future that resolves immediately.
pub fn ready_boxed<T: 'static>(value: T) -> StaticBoxFuture<T> {
    Box::pin(futures::future::ready(value))
}
