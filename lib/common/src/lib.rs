//! Foundational utilities shared by the protocol and runtime crates.
//!
//! Nothing in this crate knows anything about execution contexts,
//! suggestions, or visualizations — it is the same kind of ambient layer a
//! `prelude`/`logger`/`utils` crate trio provides in any larger workspace.

pub mod clone_ref;
pub mod future;
pub mod logger;
pub mod notification;

/// Re-exports commonly needed across both the protocol and runtime crates.
pub mod prelude {
    pub use crate::clone_ref::shared;
    pub use crate::clone_ref::CloneRef;
    pub use crate::clone_ref::Shared;
    pub use crate::future::ready_boxed;
    pub use crate::future::BoxFuture;
    pub use crate::future::StaticBoxFuture;
    pub use crate::logger::AnyLogger;
    pub use crate::logger::Logger;

    pub use std::cell::RefCell;
    pub use std::collections::HashMap;
    pub use std::collections::HashSet;
    pub use std::fmt::Debug;
    pub use std::rc::Rc;
    pub use std::rc::Weak;
    pub use std::sync::Arc;

    pub use futures::future::FutureExt;
    pub use futures::stream::StreamExt;
    pub use futures::Future;
    pub use futures::Stream;

    pub use uuid::Uuid;

    pub use crate::debug;
    pub use crate::error;
    pub use crate::info;
    pub use crate::trace;
    pub use crate::warning;
}
