use route_controller_k8s_api::{
    Api, Client, DeleteParams, ErrorResponse, Managed, ManagedKind, ManagedObject, ObjectRef,
    PostParams, ResourceExt,
};
use std::{fmt, future::Future};
use tokio::time;

const FIELD_MANAGER: &str = "route-controller";

/// Writes managed objects to the cluster.
#[async_trait::async_trait]
pub trait Apply {
    /// Creates the object, or overwrites the controller-owned fields of the
    /// existing one.
    async fn create_or_update(&self, desired: ManagedObject) -> Result<Outcome, ApplyError>;

    async fn delete(&self, object: &ObjectRef) -> Result<Deleted, ApplyError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Deleted {
    Deleted,
    NotFound,
}

/// A failed write. Every variant is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("writing {0} timed out")]
    Timeout(ObjectRef),

    #[error("{0} was modified concurrently")]
    Conflict(ObjectRef),

    #[error("failed to write {object}: {source}")]
    Kube {
        object: ObjectRef,
        #[source]
        source: kube::Error,
    },
}

/// Applies objects through the Kubernetes API, bounding each call by a
/// deadline.
#[derive(Clone)]
pub struct KubeApply {
    client: Client,
    timeout: time::Duration,
}

// === impl Outcome ===

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => "created".fmt(f),
            Self::Updated => "updated".fmt(f),
            Self::Unchanged => "unchanged".fmt(f),
        }
    }
}

// === impl KubeApply ===

impl KubeApply {
    pub fn new(client: Client, timeout: time::Duration) -> Self {
        Self { client, timeout }
    }

    async fn deadline<T>(
        &self,
        object: &ObjectRef,
        op: impl Future<Output = Result<T, kube::Error>>,
    ) -> Result<T, ApplyError> {
        match time::timeout(self.timeout, op).await {
            Ok(Ok(res)) => Ok(res),
            Ok(Err(kube::Error::Api(ErrorResponse { code: 409, .. }))) => {
                Err(ApplyError::Conflict(object.clone()))
            }
            Ok(Err(source)) => Err(ApplyError::Kube {
                object: object.clone(),
                source,
            }),
            Err(_) => Err(ApplyError::Timeout(object.clone())),
        }
    }

    async fn upsert<K: Managed>(&self, desired: K) -> Result<Outcome, kube::Error> {
        let namespace = desired.namespace().unwrap_or_default();
        let name = desired.name_any();
        let api = Api::<K>::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        let Some(mut actual) = api.get_opt(&name).await? else {
            api.create(&params, &desired).await?;
            return Ok(Outcome::Created);
        };
        if !K::overwrite(&mut actual, &desired) {
            return Ok(Outcome::Unchanged);
        }
        // The actual object carries its resource version, so a concurrent
        // write fails with a conflict rather than being lost.
        api.replace(&name, &params, &actual).await?;
        Ok(Outcome::Updated)
    }

    async fn remove<K: Managed>(&self, object: &ObjectRef) -> Result<Deleted, kube::Error> {
        let api = Api::<K>::namespaced(self.client.clone(), &object.namespace);
        match api.delete(&object.name, &DeleteParams::default()).await {
            Ok(_) => Ok(Deleted::Deleted),
            Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => Ok(Deleted::NotFound),
            Err(error) => Err(error),
        }
    }
}

#[async_trait::async_trait]
impl Apply for KubeApply {
    async fn create_or_update(&self, desired: ManagedObject) -> Result<Outcome, ApplyError> {
        let object = desired.reference();
        match desired {
            ManagedObject::Service(svc) => self.deadline(&object, self.upsert(svc)).await,
            ManagedObject::HttpProxy(hp) => self.deadline(&object, self.upsert(hp)).await,
            ManagedObject::VirtualService(vs) => self.deadline(&object, self.upsert(vs)).await,
        }
    }

    async fn delete(&self, object: &ObjectRef) -> Result<Deleted, ApplyError> {
        use route_controller_k8s_api::{HTTPProxy, Service, VirtualService};

        match object.kind {
            ManagedKind::Service => self.deadline(object, self.remove::<Service>(object)).await,
            ManagedKind::HttpProxy => self.deadline(object, self.remove::<HTTPProxy>(object)).await,
            ManagedKind::VirtualService => {
                self.deadline(object, self.remove::<VirtualService>(object))
                    .await
            }
        }
    }
}
