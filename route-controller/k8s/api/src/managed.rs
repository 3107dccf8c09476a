//! The fixed set of object kinds the controller creates, updates and deletes.

use crate::{HTTPProxy, Service, ServiceSpec, VirtualService};
use k8s_openapi::NamespaceResourceScope;
use kube::{api::ObjectMeta, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedKind {
    Service,
    HttpProxy,
    VirtualService,
}

/// Names a managed object in the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: ManagedKind,
    pub namespace: String,
    pub name: String,
}

/// A desired or actual managed object.
#[derive(Clone, Debug, PartialEq)]
pub enum ManagedObject {
    Service(Service),
    HttpProxy(HTTPProxy),
    VirtualService(VirtualService),
}

/// A resource type the controller manages.
pub trait Managed:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const KIND: ManagedKind;

    /// Overwrites the fields of `actual` that the controller owns with those of
    /// `desired`, returning whether anything changed.
    ///
    /// Identity and server-populated fields are left alone.
    fn overwrite(actual: &mut Self, desired: &Self) -> bool;

    fn wrap(self) -> ManagedObject;
}

// === impl ManagedKind ===

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => Service::kind(&()).fmt(f),
            Self::HttpProxy => HTTPProxy::kind(&()).fmt(f),
            Self::VirtualService => VirtualService::kind(&()).fmt(f),
        }
    }
}

// === impl ObjectRef ===

impl ObjectRef {
    pub fn new(kind: ManagedKind, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

// === impl ManagedObject ===

impl ManagedObject {
    pub fn kind(&self) -> ManagedKind {
        match self {
            Self::Service(_) => ManagedKind::Service,
            Self::HttpProxy(_) => ManagedKind::HttpProxy,
            Self::VirtualService(_) => ManagedKind::VirtualService,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Service(svc) => svc.meta(),
            Self::HttpProxy(hp) => hp.meta(),
            Self::VirtualService(vs) => vs.meta(),
        }
    }

    pub fn reference(&self) -> ObjectRef {
        let meta = self.metadata();
        ObjectRef {
            kind: self.kind(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }

    /// Overwrites this object's controller-owned fields with `desired`'s.
    ///
    /// Returns `None` when the two objects are of different kinds.
    pub fn overwrite(&mut self, desired: &ManagedObject) -> Option<bool> {
        match (self, desired) {
            (Self::Service(a), Self::Service(d)) => Some(Managed::overwrite(a, d)),
            (Self::HttpProxy(a), Self::HttpProxy(d)) => Some(Managed::overwrite(a, d)),
            (Self::VirtualService(a), Self::VirtualService(d)) => Some(Managed::overwrite(a, d)),
            _ => None,
        }
    }
}

// === impl Managed ===

impl Managed for Service {
    const KIND: ManagedKind = ManagedKind::Service;

    fn overwrite(actual: &mut Self, desired: &Self) -> bool {
        let mut changed = overwrite_metadata(&mut actual.metadata, &desired.metadata);

        // The API server assigns cluster IPs and other defaults, so only the
        // selector and ports are ours to overwrite.
        let desired_spec = desired.spec.clone().unwrap_or_default();
        let actual_spec = actual.spec.get_or_insert_with(ServiceSpec::default);
        changed |= replace(&mut actual_spec.selector, desired_spec.selector);
        changed |= replace(&mut actual_spec.ports, desired_spec.ports);
        changed
    }

    fn wrap(self) -> ManagedObject {
        ManagedObject::Service(self)
    }
}

impl Managed for HTTPProxy {
    const KIND: ManagedKind = ManagedKind::HttpProxy;

    fn overwrite(actual: &mut Self, desired: &Self) -> bool {
        overwrite_metadata(&mut actual.metadata, &desired.metadata)
            | replace(&mut actual.spec, desired.spec.clone())
    }

    fn wrap(self) -> ManagedObject {
        ManagedObject::HttpProxy(self)
    }
}

impl Managed for VirtualService {
    const KIND: ManagedKind = ManagedKind::VirtualService;

    fn overwrite(actual: &mut Self, desired: &Self) -> bool {
        overwrite_metadata(&mut actual.metadata, &desired.metadata)
            | replace(&mut actual.spec, desired.spec.clone())
    }

    fn wrap(self) -> ManagedObject {
        ManagedObject::VirtualService(self)
    }
}

fn overwrite_metadata(actual: &mut ObjectMeta, desired: &ObjectMeta) -> bool {
    replace(&mut actual.labels, desired.labels.clone())
        | replace(&mut actual.annotations, desired.annotations.clone())
        | replace(&mut actual.owner_references, desired.owner_references.clone())
}

fn replace<T: PartialEq>(field: &mut T, value: T) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    true
}

/// Route UIDs listed in an object's owner references.
pub fn route_owner_uids<K: ResourceExt>(obj: &K) -> Vec<String> {
    let api_version = crate::Route::api_version(&());
    let kind = crate::Route::kind(&());
    obj.owner_references()
        .iter()
        .filter(|o| o.api_version == api_version && o.kind == kind)
        .map(|o| o.uid.clone())
        .collect()
}
