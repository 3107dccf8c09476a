use kube::ResourceExt;
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use parking_lot::RwLock;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

/// Wraps a shared index to count the watch events it observes and report how
/// many resources of each kind it holds per namespace.
pub struct IndexMetrics<T> {
    inner: T,

    objects: Family<NamespaceKindLabels, Gauge>,
    applies: Family<NamespaceKindLabels, Counter>,
    deletes: Family<NamespaceKindLabels, Counter>,
    resets: Family<KindLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct NamespaceKindLabels {
    namespace: String,
    kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

/// Counts the resources of type `R` an index holds in a namespace.
pub trait SizedIndex<R> {
    fn size(&self, namespace: &str) -> usize;
}

impl<T, R> SizedIndex<R> for Arc<RwLock<T>>
where
    T: SizedIndex<R>,
{
    fn size(&self, namespace: &str) -> usize {
        self.read().size(namespace)
    }
}

impl<T> IndexMetrics<T> {
    pub fn register(inner: T, prom: &mut Registry) -> Self {
        let objects = Family::default();
        prom.register(
            "objects",
            "Number of resources held in the index",
            objects.clone(),
        );

        let applies = Family::default();
        prom.register(
            "applies",
            "Count of resource updates observed by the index",
            applies.clone(),
        );

        let deletes = Family::default();
        prom.register(
            "deletes",
            "Count of resource deletions observed by the index",
            deletes.clone(),
        );

        let resets = Family::default();
        prom.register(
            "resets",
            "Count of watch restarts observed by the index",
            resets.clone(),
        );

        Self {
            inner,
            objects,
            applies,
            deletes,
            resets,
        }
    }

    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    fn labels<R: ResourceExt<DynamicType = ()>>(namespace: String) -> NamespaceKindLabels {
        NamespaceKindLabels {
            namespace,
            kind: R::kind(&()).to_string(),
        }
    }
}

impl<T> IndexMetrics<Arc<RwLock<T>>> {
    fn observe_size<R>(&self, namespace: String)
    where
        T: SizedIndex<R>,
        R: ResourceExt<DynamicType = ()>,
    {
        let size = SizedIndex::<R>::size(&self.inner, &namespace);
        self.objects
            .get_or_create(&Self::labels::<R>(namespace))
            .set(size as i64);
    }
}

impl<R, T> IndexNamespacedResource<R> for IndexMetrics<Arc<RwLock<T>>>
where
    T: SizedIndex<R> + IndexNamespacedResource<R>,
    R: ResourceExt<DynamicType = ()>,
{
    fn apply(&mut self, resource: R) {
        let namespace = resource.namespace().unwrap_or_default();
        self.applies
            .get_or_create(&Self::labels::<R>(namespace.clone()))
            .inc();
        self.inner.write().apply(resource);
        self.observe_size::<R>(namespace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.deletes
            .get_or_create(&Self::labels::<R>(namespace.clone()))
            .inc();
        self.inner.write().delete(namespace.clone(), name);
        self.observe_size::<R>(namespace);
    }

    fn reset(&mut self, resources: Vec<R>, removed: NamespacedRemoved) {
        let mut namespaces = resources
            .iter()
            .filter_map(|r| r.namespace())
            .chain(removed.keys().cloned())
            .collect::<Vec<_>>();
        namespaces.sort();
        namespaces.dedup();

        self.resets
            .get_or_create(&KindLabels {
                kind: R::kind(&()).to_string(),
            })
            .inc();
        self.inner.write().reset(resources, removed);
        for namespace in namespaces {
            self.observe_size::<R>(namespace);
        }
    }
}
