use route_controller_core::{IngressProvider, RoutingRule, VirtualHost, WeightedBackend};
use route_controller_k8s_api::istio::{
    Destination, HTTPMatchRequest, HTTPRoute, HTTPRouteDestination, HeaderOperations, Headers,
    PortSelector, StringMatch, VirtualServiceSpec, MESH_GATEWAY,
};

/// Writes Istio `VirtualService`s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Istio {
    /// The ingress gateway external hostnames are bound to, as `namespace/name`.
    pub gateway: String,
}

impl IngressProvider for Istio {
    type Spec = VirtualServiceSpec;

    fn routing_spec(&self, vhost: &VirtualHost) -> VirtualServiceSpec {
        let gateway = if vhost.internal {
            MESH_GATEWAY.to_string()
        } else {
            self.gateway.clone()
        };

        VirtualServiceSpec {
            hosts: vec![vhost.fqdn.clone()],
            gateways: vec![gateway],
            http: vhost.rules.iter().map(http_route).collect(),
        }
    }
}

fn http_route(rule: &RoutingRule) -> HTTPRoute {
    let matches = rule
        .path
        .iter()
        .map(|prefix| HTTPMatchRequest {
            uri: Some(StringMatch::Prefix(prefix.clone())),
        })
        .collect();

    HTTPRoute {
        matches,
        route: rule.backends.iter().map(destination).collect(),
    }
}

fn destination(backend: &WeightedBackend) -> HTTPRouteDestination {
    let headers = (!backend.headers.is_empty()).then(|| Headers {
        request: Some(HeaderOperations {
            set: backend.headers.clone(),
        }),
    });

    HTTPRouteDestination {
        destination: Destination {
            host: backend.service.clone(),
            port: backend.port.map(|port| PortSelector {
                number: u32::from(port),
            }),
        },
        weight: backend.weight.and_then(|w| i32::try_from(w).ok()),
        headers,
    }
}
