use crate::labels;
use kube::{CustomResource, ResourceExt};
use route_controller_core::{Destination, RouteDeclaration, RouteId, Tenant};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exposes a hostname, and optionally a path under it, on a set of
/// application processes.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "networking.cloudfoundry.org",
    version = "v1alpha1",
    kind = "Route",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub domain: RouteDomain,
    #[serde(default)]
    pub destinations: Vec<RouteDestination>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct RouteDomain {
    pub name: String,
    #[serde(default)]
    pub internal: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct RouteDestination {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
    pub app: DestinationApp,
    #[serde(default)]
    pub selector: DestinationSelector,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct DestinationApp {
    pub guid: String,
    pub process: AppProcess,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct AppProcess {
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidRoute {
    #[error("route has no namespace")]
    MissingNamespace,

    #[error("route has no uid")]
    MissingUid,

    #[error("destination {guid} has invalid port {port}")]
    InvalidPort { guid: String, port: i32 },
}

// === impl Route ===

impl Route {
    /// The hostname the route is served on: `host.domain`, or just the domain
    /// when no host is set.
    pub fn fqdn(&self) -> String {
        if self.spec.host.is_empty() {
            return self.spec.domain.name.clone();
        }
        format!("{}.{}", self.spec.host, self.spec.domain.name)
    }

    pub fn declaration(&self) -> Result<RouteDeclaration, InvalidRoute> {
        let namespace = self.namespace().ok_or(InvalidRoute::MissingNamespace)?;
        let uid = self.uid().ok_or(InvalidRoute::MissingUid)?;

        let destinations = self
            .spec
            .destinations
            .iter()
            .map(|dst| {
                let port = dst
                    .port
                    .map(|port| {
                        u16::try_from(port)
                            .ok()
                            .filter(|p| *p != 0)
                            .ok_or_else(|| InvalidRoute::InvalidPort {
                                guid: dst.guid.clone(),
                                port,
                            })
                    })
                    .transpose()?;
                Ok(Destination {
                    guid: dst.guid.clone(),
                    app_guid: dst.app.guid.clone(),
                    process_type: dst.app.process.type_.clone(),
                    port,
                    weight: dst.weight,
                    selector: dst.selector.match_labels.clone(),
                })
            })
            .collect::<Result<Vec<_>, InvalidRoute>>()?;

        let route_labels = self.labels();
        Ok(RouteDeclaration {
            id: RouteId::new(namespace, self.name_any()),
            uid,
            fqdn: self.fqdn(),
            path: self.spec.path.clone().filter(|p| !p.is_empty()),
            internal: self.spec.domain.internal,
            destinations,
            tenant: Tenant {
                organization: route_labels.get(labels::ORG_GUID_LABEL).cloned(),
                space: route_labels.get(labels::SPACE_GUID_LABEL).cloned(),
            },
        })
    }
}
