#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod contour;
pub mod istio;
pub mod labels;
pub mod managed;
pub mod route;

pub use self::{
    contour::HTTPProxy,
    istio::VirtualService,
    managed::{Managed, ManagedKind, ManagedObject, ObjectRef},
    route::{InvalidRoute, Route, RouteSpec},
};
pub use k8s_openapi::{
    api::{
        self,
        coordination::v1::Lease,
        core::v1::{Service, ServicePort, ServiceSpec},
    },
    apimachinery::pkg::{apis::meta::v1::OwnerReference, util::intstr::IntOrString},
};
pub use kube::{
    api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams, Resource, ResourceExt},
    error::ErrorResponse,
    Client, Error,
};
