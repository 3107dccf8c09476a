use crate::{
    apply::{Apply, ApplyError, Deleted, Outcome},
    metrics::ControllerMetrics,
    resources, Provider,
};
use route_controller_core::{backend, routing, HostnameGroup, RouteId};
use route_controller_k8s_api::{ManagedKind, ManagedObject, ObjectRef};
use route_controller_k8s_index::RouteStore;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// Drives the cluster toward the state implied by a single route.
pub struct Reconciler<S, A> {
    store: S,
    apply: A,
    provider: Provider,
    metrics: ControllerMetrics,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Counts of the mutations a pass made.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,

    /// Hostnames that could not be rebuilt because their routes disagree or
    /// declare invalid weights.
    pub invalid: Vec<String>,
}

/// What a pass is reconciling: a live route, or the remains of a deleted one.
struct Subject {
    uid: String,
    fqdn: String,
    services: Vec<backend::DesiredService>,
}

impl<S: RouteStore, A: Apply> Reconciler<S, A> {
    pub fn new(store: S, apply: A, provider: Provider, metrics: ControllerMetrics) -> Self {
        Self {
            store,
            apply,
            provider,
            metrics,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one reconciliation pass for `id`.
    ///
    /// Validation failures are logged and reported in the summary; only
    /// transient write failures are returned as errors.
    #[instrument(skip(self, id), fields(route = %id))]
    pub async fn reconcile(&self, id: &RouteId) -> Result<Summary, Error> {
        let mut summary = Summary::default();

        let subject = if let Some(route) = self.store.get(id) {
            Subject {
                services: backend::build_services(&route),
                uid: route.uid,
                fqdn: route.fqdn,
            }
        } else if let Some(tombstone) = self.store.tombstone(id) {
            debug!(uid = %tombstone.uid, "Cleaning up after deleted route");
            Subject {
                uid: tombstone.uid,
                fqdn: tombstone.fqdn,
                services: Vec::new(),
            }
        } else {
            debug!("Route not found");
            return Ok(summary);
        };

        self.reconcile_services(&subject, &mut summary).await?;
        self.reconcile_routing(id, &subject, &mut summary).await?;

        Ok(summary)
    }

    async fn reconcile_services(
        &self,
        subject: &Subject,
        summary: &mut Summary,
    ) -> Result<(), Error> {
        let mut desired = BTreeSet::new();
        for svc in &subject.services {
            let object = ManagedObject::Service(resources::service(svc));
            desired.insert(object.reference());
            self.create_or_update(object, summary).await?;
        }

        for owned in self.store.list_owned_by(ManagedKind::Service, &subject.uid) {
            if !desired.contains(&owned.reference) {
                self.delete(&owned.reference, summary).await?;
            }
        }
        Ok(())
    }

    async fn reconcile_routing(
        &self,
        id: &RouteId,
        subject: &Subject,
        summary: &mut Summary,
    ) -> Result<(), Error> {
        let kind = self.provider.kind();

        // Hostnames this route previously contributed to must be rebuilt too,
        // so that they drop it.
        let mut hostnames = BTreeSet::new();
        hostnames.insert(subject.fqdn.clone());
        for owned in self.store.list_owned_by(kind, &subject.uid) {
            match owned.fqdn {
                Some(fqdn) => {
                    hostnames.insert(fqdn);
                }
                None => {
                    warn!(object = %owned.reference, "Routing object has no hostname annotation");
                }
            }
        }

        for fqdn in hostnames {
            let members = self.store.list_by_hostname(&id.namespace, &fqdn);
            if members.is_empty() {
                let object = ObjectRef::new(kind, &id.namespace, routing::object_name(&fqdn));
                self.delete(&object, summary).await?;
                continue;
            }

            let vhost = match HostnameGroup::new(fqdn.clone(), members)
                .and_then(|group| routing::build_virtual_host(&group))
            {
                Ok(vhost) => vhost,
                Err(error) => {
                    warn!(%fqdn, %error, "Skipping invalid hostname");
                    self.metrics.invalid_hostname();
                    summary.invalid.push(fqdn);
                    continue;
                }
            };
            self.create_or_update(self.provider.routing_object(&vhost), summary)
                .await?;
        }
        Ok(())
    }

    async fn create_or_update(
        &self,
        object: ManagedObject,
        summary: &mut Summary,
    ) -> Result<(), Error> {
        let reference = object.reference();
        let outcome = self.apply.create_or_update(object).await?;
        match outcome {
            Outcome::Created => summary.created += 1,
            Outcome::Updated => summary.updated += 1,
            Outcome::Unchanged => {
                summary.unchanged += 1;
                debug!(object = %reference, "Unchanged");
                return Ok(());
            }
        }
        self.metrics.mutated(reference.kind, outcome);
        info!(object = %reference, %outcome, "Applied");
        Ok(())
    }

    async fn delete(&self, object: &ObjectRef, summary: &mut Summary) -> Result<(), Error> {
        match self.apply.delete(object).await? {
            Deleted::Deleted => {
                summary.deleted += 1;
                self.metrics.deleted(object.kind);
                info!(%object, "Deleted");
            }
            Deleted::NotFound => debug!(%object, "Already deleted"),
        }
        Ok(())
    }
}
