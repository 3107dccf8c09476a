//! Route controller index
//!
//! Caches the cluster state the reconciler reads, fed by kubert's namespaced
//! index watches:
//!
//! - Each `Route` is converted to a declaration and indexed by identity and by
//!   `(namespace, fqdn)`, so that a hostname group can be listed without a
//!   namespace scan.
//! - Each managed object (backend `Service`s and the active routing kind) is
//!   indexed by the UIDs of the routes listed in its owner references, so that
//!   the objects a route produced can be listed for garbage collection.
//!
//! ```text
//! [ Route ] -> fqdn index  -> [ HostnameGroup ]
//!     ^
//!     \-- owner index <- [ Service | HTTPProxy | VirtualService ]
//! ```
//!
//! Every change that can alter a route's desired state pushes that route's id
//! onto the reconciler's work queue.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod index;
pub mod metrics;
mod store;

#[cfg(test)]
mod tests;

pub use self::{
    index::{Index, SharedIndex},
    metrics::IndexMetrics,
    store::{OwnedObject, RouteStore, Tombstone},
};
