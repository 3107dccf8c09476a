//! Route controller core
//!
//! Pure, cluster-agnostic logic for turning route declarations into the
//! objects that serve their traffic:
//!
//! - [`group`] gathers the declarations that share a hostname and validates
//!   that they can be served by a single routing object.
//! - [`backend`] derives one backend service per destination and the weighted
//!   references that routing rules point at.
//! - [`routing`] aggregates a hostname group into a technology-agnostic
//!   [`VirtualHost`], which an [`IngressProvider`] shapes into a concrete
//!   routing spec.
//!
//! ```text
//! [ RouteDeclaration ]* -> [ HostnameGroup ] -> [ VirtualHost ] -> IngressProvider
//!          \-> [ DesiredService ]*
//! ```
//!
//! Nothing in this crate reads or writes cluster state. Every builder is a
//! function of its input, so identical input always yields identical output.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod backend;
mod error;
pub mod group;
pub mod provider;
pub mod route;
pub mod routing;
mod weights;


pub use self::{
    backend::{DesiredService, WeightedBackend},
    error::{Error, Inconsistency},
    group::HostnameGroup,
    provider::IngressProvider,
    route::{Destination, RouteDeclaration, RouteId, RouteRef, Tenant},
    routing::{RoutingRule, VirtualHost},
};
