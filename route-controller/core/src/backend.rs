use crate::{weights, Destination, Error, RouteDeclaration, RouteRef};
use std::collections::BTreeMap;

/// Port that backend services expose when a destination does not name one.
pub const DEFAULT_PORT: u16 = 8080;

/// A service name that never exists. Routing to it fails closed.
pub const PLACEHOLDER_SERVICE: &str = "no-destinations";

pub const APP_GUID_LABEL: &str = "cloudfoundry.org/app_guid";
pub const PROCESS_TYPE_LABEL: &str = "cloudfoundry.org/process_type";
pub const ROUTE_GUID_LABEL: &str = "cloudfoundry.org/route_guid";
pub const ROUTE_FQDN_ANNOTATION: &str = "cloudfoundry.org/route-fqdn";

pub const APP_ID_HEADER: &str = "CF-App-Id";
pub const PROCESS_TYPE_HEADER: &str = "CF-App-Process-Type";
pub const SPACE_ID_HEADER: &str = "CF-Space-Id";
pub const ORGANIZATION_ID_HEADER: &str = "CF-Organization-Id";

/// The backend service for one destination of one route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredService {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner: RouteRef,
    pub selector: BTreeMap<String, String>,
    pub port: u16,
}

/// A routing rule's reference to a backend service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightedBackend {
    pub service: String,
    pub port: Option<u16>,
    pub weight: Option<u32>,
    /// Request headers set on traffic forwarded to this backend.
    pub headers: BTreeMap<String, String>,
}

pub fn service_name(destination: &Destination) -> String {
    format!("s-{}", destination.guid)
}

/// Builds one backend service per destination, in destination order.
pub fn build_services(route: &RouteDeclaration) -> Vec<DesiredService> {
    route
        .destinations
        .iter()
        .map(|dst| DesiredService {
            name: service_name(dst),
            namespace: route.id.namespace.clone(),
            labels: BTreeMap::from([
                (APP_GUID_LABEL.to_string(), dst.app_guid.clone()),
                (PROCESS_TYPE_LABEL.to_string(), dst.process_type.clone()),
                (ROUTE_GUID_LABEL.to_string(), route.id.name.clone()),
            ]),
            annotations: BTreeMap::from([(ROUTE_FQDN_ANNOTATION.to_string(), route.fqdn.clone())]),
            owner: route.owner(),
            selector: dst.selector.clone(),
            port: dst.port.unwrap_or(DEFAULT_PORT),
        })
        .collect()
}

/// Resolves the weighted backend references for a route's destinations.
///
/// Weights are either all explicit (passed through verbatim) or all implicit
/// (100 split evenly, remainder on the first destination).
pub fn weighted_backends(route: &RouteDeclaration) -> Result<Vec<WeightedBackend>, Error> {
    let weights = weights::resolve(route)?;
    let backends = route
        .destinations
        .iter()
        .zip(weights)
        .map(|(dst, weight)| WeightedBackend {
            service: service_name(dst),
            port: Some(dst.port.unwrap_or(DEFAULT_PORT)),
            weight: Some(weight),
            headers: BTreeMap::from([
                (APP_ID_HEADER.to_string(), dst.app_guid.clone()),
                (PROCESS_TYPE_HEADER.to_string(), dst.process_type.clone()),
                (
                    SPACE_ID_HEADER.to_string(),
                    route.tenant.space.clone().unwrap_or_default(),
                ),
                (
                    ORGANIZATION_ID_HEADER.to_string(),
                    route.tenant.organization.clone().unwrap_or_default(),
                ),
            ]),
        })
        .collect();
    Ok(backends)
}

/// The sole backend of a route with no destinations.
pub fn placeholder() -> WeightedBackend {
    WeightedBackend {
        service: PLACEHOLDER_SERVICE.to_string(),
        port: None,
        weight: None,
        headers: BTreeMap::new(),
    }
}
