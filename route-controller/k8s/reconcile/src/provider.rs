mod contour;
mod istio;

pub use self::{contour::Contour, istio::Istio};

use crate::resources;
use route_controller_core::{IngressProvider, VirtualHost};
use route_controller_k8s_api::{HTTPProxy, ManagedKind, ManagedObject, VirtualService};

/// The ingress technology the controller configures, chosen at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Contour(Contour),
    Istio(Istio),
}

impl Provider {
    /// The kind of routing object this provider writes.
    pub fn kind(&self) -> ManagedKind {
        match self {
            Self::Contour(_) => ManagedKind::HttpProxy,
            Self::Istio(_) => ManagedKind::VirtualService,
        }
    }

    pub fn routing_object(&self, vhost: &VirtualHost) -> ManagedObject {
        let metadata = resources::routing_metadata(vhost);
        match self {
            Self::Contour(contour) => ManagedObject::HttpProxy(HTTPProxy {
                metadata,
                spec: contour.routing_spec(vhost),
            }),
            Self::Istio(istio) => ManagedObject::VirtualService(VirtualService {
                metadata,
                spec: istio.routing_spec(vhost),
            }),
        }
    }
}

impl From<Contour> for Provider {
    fn from(contour: Contour) -> Self {
        Self::Contour(contour)
    }
}

impl From<Istio> for Provider {
    fn from(istio: Istio) -> Self {
        Self::Istio(istio)
    }
}
