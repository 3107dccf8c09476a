use crate::resources::backend_port;
use route_controller_core::{IngressProvider, RoutingRule, VirtualHost, WeightedBackend};
use route_controller_k8s_api::contour::{
    HTTPProxySpec, HeaderValue, HeadersPolicy, MatchCondition, Route, Service, Tls,
    VirtualHost as ProxyHost,
};

/// Writes Contour `HTTPProxy`s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contour {
    /// Certificate served for external hostnames.
    pub tls_secret_name: Option<String>,

    /// Refuses plaintext requests when set.
    pub https_only: bool,
}

impl IngressProvider for Contour {
    type Spec = HTTPProxySpec;

    fn routing_spec(&self, vhost: &VirtualHost) -> HTTPProxySpec {
        let tls = self
            .tls_secret_name
            .clone()
            .filter(|_| !vhost.internal)
            .map(|secret_name| Tls { secret_name });

        HTTPProxySpec {
            virtualhost: Some(ProxyHost {
                fqdn: vhost.fqdn.clone(),
                tls,
            }),
            routes: vhost.rules.iter().map(|rule| self.route(rule)).collect(),
        }
    }
}

impl Contour {
    fn route(&self, rule: &RoutingRule) -> Route {
        let conditions = rule
            .path
            .iter()
            .map(|prefix| MatchCondition {
                prefix: Some(prefix.clone()),
            })
            .collect();

        Route {
            conditions,
            services: rule.backends.iter().map(service).collect(),
            permit_insecure: !self.https_only,
        }
    }
}

fn service(backend: &WeightedBackend) -> Service {
    let request_headers_policy = (!backend.headers.is_empty()).then(|| HeadersPolicy {
        set: backend
            .headers
            .iter()
            .map(|(name, value)| HeaderValue {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    });

    Service {
        name: backend.service.clone(),
        port: i32::from(backend_port(backend.port)),
        weight: backend.weight.map(i64::from),
        request_headers_policy,
    }
}
