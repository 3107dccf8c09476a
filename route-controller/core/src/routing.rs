use crate::{
    backend::{self, WeightedBackend},
    Error, HostnameGroup, RouteId, RouteRef,
};
use sha2::{Digest, Sha256};
use std::cmp::Reverse;

pub const FQDN_ANNOTATION: &str = "cloudfoundry.org/fqdn";

/// Everything needed to route one hostname, independent of the ingress
/// technology that will serve it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualHost {
    pub name: String,
    pub namespace: String,
    pub fqdn: String,
    pub internal: bool,
    /// Every member of the hostname group, in group order, including members
    /// that contribute no rule.
    pub owners: Vec<RouteRef>,
    pub rules: Vec<RoutingRule>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingRule {
    pub route: RouteId,
    /// Path prefix to match. `None` matches everything.
    pub path: Option<String>,
    pub backends: Vec<WeightedBackend>,
}

/// Names the routing object for a hostname.
///
/// Hostnames may contain characters that object names may not, so the name is
/// a digest of the hostname.
pub fn object_name(fqdn: &str) -> String {
    format!("vs-{}", hex::encode(Sha256::digest(fqdn.as_bytes())))
}

/// Builds the virtual host for a hostname group.
///
/// Rules with a path precede the catch-all, and longer prefixes precede
/// shorter ones, so first-match routers resolve the most specific rule. Ties
/// keep the group's identity order.
pub fn build_virtual_host(group: &HostnameGroup) -> Result<VirtualHost, Error> {
    let sole_member = group.members().len() == 1;

    let mut rules = Vec::with_capacity(group.members().len());
    for route in group.members() {
        let backends = if !route.destinations.is_empty() {
            backend::weighted_backends(route)?
        } else if sole_member {
            vec![backend::placeholder()]
        } else {
            continue;
        };

        rules.push(RoutingRule {
            route: route.id.clone(),
            path: route.path.clone().filter(|p| !p.is_empty()),
            backends,
        });
    }
    rules.sort_by_key(|rule| match rule.path.as_deref() {
        Some(path) => (false, Reverse(path.len())),
        None => (true, Reverse(0)),
    });

    Ok(VirtualHost {
        name: object_name(group.fqdn()),
        namespace: group.namespace().to_string(),
        fqdn: group.fqdn().to_string(),
        internal: group.internal(),
        owners: group.members().iter().map(|r| r.owner()).collect(),
        rules,
    })
}
