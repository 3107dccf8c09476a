use crate::RouteId;
use std::fmt;

/// Validation failures. Each is local to one hostname group and will not go
/// away by retrying; the declarations themselves have to change.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("routes {first} and {other} share the FQDN {fqdn} but disagree on {reason}")]
    GroupInconsistency {
        fqdn: String,
        first: RouteId,
        other: RouteId,
        reason: Inconsistency,
    },

    #[error("hostname group {fqdn} has no routes")]
    EmptyGroup { fqdn: String },

    #[error("invalid destinations for route {route}: weights must be set on all or none")]
    MixedWeights { route: RouteId },

    #[error("invalid destination {destination} for route {route}: weight {weight} is outside 0..=100")]
    WeightOutOfRange {
        route: RouteId,
        destination: String,
        weight: i32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Inconsistency {
    Internal,
    Namespace,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => "whether or not the domain is internal".fmt(f),
            Self::Namespace => "their namespace".fmt(f),
        }
    }
}
