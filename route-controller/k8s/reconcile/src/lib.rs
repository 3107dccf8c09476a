//! Route reconciliation
//!
//! A [`Controller`] drains the queue of route ids that the index fills. For
//! each id a [`Reconciler`] pass:
//!
//! 1. builds one backend `Service` per destination of the route, creating or
//!    updating each and deleting the services the route owns but no longer
//!    wants;
//! 2. rebuilds the routing object of every hostname the route serves or used
//!    to serve, through the active [`Provider`], deleting it once no route
//!    serves the hostname.
//!
//! Deleted routes are reconciled from their tombstone, which drives both
//! steps with an empty desired state. Transient write failures requeue the
//! route with exponential backoff; invalid hostname groups are logged and
//! skipped until a route changes.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod apply;
mod controller;
pub mod metrics;
pub mod provider;
mod reconciler;
mod resources;
mod resync;


pub use self::{
    apply::{Apply, ApplyError, Deleted, KubeApply, Outcome},
    controller::{Controller, WriteLease},
    metrics::ControllerMetrics,
    provider::{Contour, Istio, Provider},
    reconciler::{Error, Reconciler, Summary},
    resync::resync,
};
