use crate::{
    metrics::SizedIndex,
    store::{OwnedObject, RouteStore, Tombstone},
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use kube::ResourceExt;
use parking_lot::RwLock;
use route_controller_core::{RouteDeclaration, RouteId};
use route_controller_k8s_api::{
    self as k8s, labels, managed::route_owner_uids, Managed, ManagedKind, ObjectRef,
};
use std::{collections::BTreeSet, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;

pub type SharedIndex = Arc<RwLock<Index>>;

pub struct Index {
    routes: HashMap<RouteId, RouteDeclaration>,
    by_fqdn: HashMap<FqdnKey, BTreeSet<RouteId>>,
    by_uid: HashMap<String, RouteId>,
    tombstones: HashMap<RouteId, Tombstone>,
    owned: HashMap<ManagedKind, OwnerIndex>,

    /// Notifies the reconciler of routes whose desired state may have changed.
    queue: UnboundedSender<RouteId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FqdnKey {
    namespace: String,
    fqdn: String,
}

#[derive(Debug, Default)]
struct OwnerIndex {
    objects: HashMap<ObjectRef, Owners>,
    by_owner: HashMap<String, BTreeSet<ObjectRef>>,
}

#[derive(Debug)]
struct Owners {
    uids: Vec<String>,
    fqdn: Option<String>,
}

// === impl Index ===

impl Index {
    pub fn shared(queue: UnboundedSender<RouteId>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            routes: HashMap::new(),
            by_fqdn: HashMap::new(),
            by_uid: HashMap::new(),
            tombstones: HashMap::new(),
            owned: HashMap::new(),
            queue,
        }))
    }

    fn enqueue(&self, id: RouteId) {
        if let Err(error) = self.queue.send(id) {
            tracing::debug!(route = %error.0, "Reconciler is not running");
        }
    }

    fn unindex_route(&mut self, route: &RouteDeclaration) {
        let key = FqdnKey::of(route);
        if let Some(ids) = self.by_fqdn.get_mut(&key) {
            ids.remove(&route.id);
            if ids.is_empty() {
                self.by_fqdn.remove(&key);
            }
        }
        if self.by_uid.get(&route.uid) == Some(&route.id) {
            self.by_uid.remove(&route.uid);
        }
    }

    fn owns_anything(&self, uid: &str) -> bool {
        self.owned
            .values()
            .any(|idx| idx.by_owner.get(uid).is_some_and(|objs| !objs.is_empty()))
    }

    /// Drops the tombstones of deleted routes that no longer own anything.
    fn prune_tombstones(&mut self, uids: &[String]) {
        for uid in uids {
            if !self.owns_anything(uid) {
                self.tombstones.retain(|_, t| t.uid != *uid);
            }
        }
    }

    /// Stops serving a route, leaving a tombstone while it still owns objects.
    fn remove_route(&mut self, id: RouteId) {
        let Some(route) = self.routes.remove(&id) else {
            return;
        };
        self.unindex_route(&route);

        if self.owns_anything(&route.uid) {
            self.tombstones.insert(
                id.clone(),
                Tombstone {
                    uid: route.uid.clone(),
                    fqdn: route.fqdn.clone(),
                },
            );
        }
        self.enqueue(id);

        // The rest of the hostname group shares the routing object.
        let remaining = self
            .by_fqdn
            .get(&FqdnKey::of(&route))
            .cloned()
            .unwrap_or_default();
        for id in remaining {
            self.enqueue(id);
        }
    }

    fn apply_owned<K: Managed>(&mut self, obj: K, fqdn_annotation: &str) {
        let Some(namespace) = obj.namespace() else {
            return;
        };
        let reference = ObjectRef::new(K::KIND, namespace, obj.name_any());
        let owners = Owners {
            uids: route_owner_uids(&obj),
            fqdn: obj.annotations().get(fqdn_annotation).cloned(),
        };
        tracing::trace!(object = %reference, owners = ?owners.uids, "Indexing");

        let released = self
            .owned
            .entry(reference.kind)
            .or_default()
            .insert(reference, owners);
        self.prune_tombstones(&released);
    }

    fn delete_owned(&mut self, kind: ManagedKind, namespace: String, name: String) {
        let reference = ObjectRef::new(kind, namespace, name);
        let Some(owners) = self
            .owned
            .get_mut(&kind)
            .and_then(|idx| idx.remove(&reference))
        else {
            return;
        };

        // Live owners should recreate the object if they still want it.
        for uid in &owners.uids {
            if let Some(id) = self.by_uid.get(uid) {
                tracing::debug!(object = %reference, route = %id, "Owned object deleted");
                self.enqueue(id.clone());
            }
        }
        self.prune_tombstones(&owners.uids);
    }
}

impl RouteStore for Index {
    fn get(&self, id: &RouteId) -> Option<RouteDeclaration> {
        self.routes.get(id).cloned()
    }

    fn tombstone(&self, id: &RouteId) -> Option<Tombstone> {
        self.tombstones.get(id).cloned()
    }

    fn list_by_hostname(&self, namespace: &str, fqdn: &str) -> Vec<RouteDeclaration> {
        let key = FqdnKey {
            namespace: namespace.to_string(),
            fqdn: fqdn.to_string(),
        };
        self.by_fqdn
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.routes.get(id).cloned())
            .collect()
    }

    fn list_owned_by(&self, kind: ManagedKind, uid: &str) -> Vec<OwnedObject> {
        let Some(idx) = self.owned.get(&kind) else {
            return Vec::new();
        };
        idx.by_owner
            .get(uid)
            .into_iter()
            .flatten()
            .map(|reference| OwnedObject {
                reference: reference.clone(),
                fqdn: idx.objects.get(reference).and_then(|o| o.fqdn.clone()),
            })
            .collect()
    }

    fn route_ids(&self) -> Vec<RouteId> {
        let mut ids = self.routes.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Route> for Index {
    fn apply(&mut self, route: k8s::Route) {
        let decl = match route.declaration() {
            Ok(decl) => decl,
            Err(error) => {
                let namespace = route.namespace().unwrap_or_default();
                let name = route.name_any();
                tracing::info!(%namespace, %name, %error, "Ignoring Route");
                // A previously valid declaration must stop being served.
                self.remove_route(RouteId { namespace, name });
                return;
            }
        };

        // Status-only updates and resyncs of the watch don't change anything.
        if self.routes.get(&decl.id) == Some(&decl) {
            return;
        }

        let id = decl.id.clone();
        self.tombstones.remove(&id);
        if let Some(prev) = self.routes.remove(&id) {
            self.unindex_route(&prev);
        }
        self.by_fqdn
            .entry(FqdnKey::of(&decl))
            .or_default()
            .insert(id.clone());
        self.by_uid.insert(decl.uid.clone(), id.clone());
        self.routes.insert(id.clone(), decl);

        self.enqueue(id);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_route(RouteId { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Service> for Index {
    fn apply(&mut self, svc: k8s::Service) {
        self.apply_owned(svc, labels::ROUTE_FQDN_ANNOTATION);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_owned(ManagedKind::Service, namespace, name);
    }
}

impl kubert::index::IndexNamespacedResource<k8s::HTTPProxy> for Index {
    fn apply(&mut self, proxy: k8s::HTTPProxy) {
        self.apply_owned(proxy, labels::FQDN_ANNOTATION);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_owned(ManagedKind::HttpProxy, namespace, name);
    }
}

impl kubert::index::IndexNamespacedResource<k8s::VirtualService> for Index {
    fn apply(&mut self, vs: k8s::VirtualService) {
        self.apply_owned(vs, labels::FQDN_ANNOTATION);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_owned(ManagedKind::VirtualService, namespace, name);
    }
}

impl SizedIndex<k8s::Route> for Index {
    fn size(&self, namespace: &str) -> usize {
        self.routes
            .keys()
            .filter(|id| id.namespace == namespace)
            .count()
    }
}

macro_rules! sized_owned {
    ($($res:ty),+) => {
        $(
            impl SizedIndex<$res> for Index {
                fn size(&self, namespace: &str) -> usize {
                    self.owned
                        .get(&<$res as Managed>::KIND)
                        .map(|idx| idx.objects.keys().filter(|r| r.namespace == namespace).count())
                        .unwrap_or(0)
                }
            }
        )+
    };
}

sized_owned!(k8s::Service, k8s::HTTPProxy, k8s::VirtualService);

// === impl FqdnKey ===

impl FqdnKey {
    fn of(route: &RouteDeclaration) -> Self {
        Self {
            namespace: route.id.namespace.clone(),
            fqdn: route.fqdn.clone(),
        }
    }
}

// === impl OwnerIndex ===

impl OwnerIndex {
    /// Indexes an object, returning the owners it no longer lists.
    fn insert(&mut self, reference: ObjectRef, owners: Owners) -> Vec<String> {
        let current = owners.uids.iter().cloned().collect::<HashSet<_>>();
        let released = match self.objects.insert(reference.clone(), owners) {
            Some(prev) => prev
                .uids
                .into_iter()
                .filter(|uid| !current.contains(uid))
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };
        for uid in &released {
            self.unlink(uid, &reference);
        }
        for uid in current {
            self.by_owner
                .entry(uid)
                .or_default()
                .insert(reference.clone());
        }
        released
    }

    fn remove(&mut self, reference: &ObjectRef) -> Option<Owners> {
        let owners = self.objects.remove(reference)?;
        for uid in &owners.uids {
            self.unlink(uid, reference);
        }
        Some(owners)
    }

    fn unlink(&mut self, uid: &str, reference: &ObjectRef) {
        if let Some(objs) = self.by_owner.get_mut(uid) {
            objs.remove(reference);
            if objs.is_empty() {
                self.by_owner.remove(uid);
            }
        }
    }
}
