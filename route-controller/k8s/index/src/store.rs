use parking_lot::RwLock;
use route_controller_core::{RouteDeclaration, RouteId};
use route_controller_k8s_api::{ManagedKind, ObjectRef};
use std::sync::Arc;

/// Read-only view of route declarations and the objects they own.
pub trait RouteStore {
    fn get(&self, id: &RouteId) -> Option<RouteDeclaration>;

    /// The last known state of a deleted route that still owns objects.
    fn tombstone(&self, id: &RouteId) -> Option<Tombstone>;

    /// Routes serving `fqdn` in `namespace`, ordered by identity.
    fn list_by_hostname(&self, namespace: &str, fqdn: &str) -> Vec<RouteDeclaration>;

    /// Objects of `kind` whose owner references include the route `uid`.
    fn list_owned_by(&self, kind: ManagedKind, uid: &str) -> Vec<OwnedObject>;

    /// Every live route, ordered by identity.
    fn route_ids(&self) -> Vec<RouteId>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tombstone {
    pub uid: String,
    pub fqdn: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedObject {
    pub reference: ObjectRef,
    /// The hostname the object was built for, from its annotations.
    pub fqdn: Option<String>,
}

impl<T: RouteStore> RouteStore for Arc<RwLock<T>> {
    fn get(&self, id: &RouteId) -> Option<RouteDeclaration> {
        self.read().get(id)
    }

    fn tombstone(&self, id: &RouteId) -> Option<Tombstone> {
        self.read().tombstone(id)
    }

    fn list_by_hostname(&self, namespace: &str, fqdn: &str) -> Vec<RouteDeclaration> {
        self.read().list_by_hostname(namespace, fqdn)
    }

    fn list_owned_by(&self, kind: ManagedKind, uid: &str) -> Vec<OwnedObject> {
        self.read().list_owned_by(kind, uid)
    }

    fn route_ids(&self) -> Vec<RouteId> {
        self.read().route_ids()
    }
}
