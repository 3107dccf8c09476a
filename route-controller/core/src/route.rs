use std::{collections::BTreeMap, fmt};

/// Identifies a route declaration within the cluster.
///
/// Ordering is namespace-then-name, which is the order members of a
/// hostname group are kept in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId {
    pub namespace: String,
    pub name: String,
}

/// A route identity paired with the cluster UID that owner references carry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteRef {
    pub id: RouteId,
    pub uid: String,
}

/// A tenant's request to expose a hostname (and optional path) on one or
/// more backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteDeclaration {
    pub id: RouteId,
    pub uid: String,
    pub fqdn: String,
    pub path: Option<String>,
    pub internal: bool,
    pub destinations: Vec<Destination>,
    pub tenant: Tenant,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tenant {
    pub organization: Option<String>,
    pub space: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    /// Identifies this destination entry; backend services are named after it.
    pub guid: String,
    pub app_guid: String,
    pub process_type: String,
    pub port: Option<u16>,
    pub weight: Option<i32>,
    pub selector: BTreeMap<String, String>,
}

// === impl RouteId ===

impl RouteId {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl RouteDeclaration ===

impl RouteDeclaration {
    pub fn owner(&self) -> RouteRef {
        RouteRef {
            id: self.id.clone(),
            uid: self.uid.clone(),
        }
    }
}
