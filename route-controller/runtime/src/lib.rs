#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use route_controller_core as core;
pub use route_controller_k8s_api as k8s;
pub use route_controller_k8s_index as index;
pub use route_controller_k8s_reconcile as reconcile;

mod args;
mod lease;

pub use self::args::Args;
