use crate::{Error, Inconsistency, RouteDeclaration};

/// All route declarations that share one externally visible hostname.
///
/// Members are ordered by identity so that everything derived from the group
/// is reproducible across otherwise-identical runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostnameGroup {
    fqdn: String,
    members: Vec<RouteDeclaration>,
}

impl HostnameGroup {
    /// Orders and validates the declarations for `fqdn`.
    ///
    /// Every member must live in the same namespace and agree on whether the
    /// domain is internal.
    pub fn new(fqdn: impl Into<String>, mut members: Vec<RouteDeclaration>) -> Result<Self, Error> {
        let fqdn = fqdn.into();
        members.sort_by(|a, b| a.id.cmp(&b.id));

        let Some(first) = members.first() else {
            return Err(Error::EmptyGroup { fqdn });
        };
        for route in &members[1..] {
            let reason = if route.internal != first.internal {
                Inconsistency::Internal
            } else if route.id.namespace != first.id.namespace {
                Inconsistency::Namespace
            } else {
                continue;
            };
            return Err(Error::GroupInconsistency {
                fqdn,
                first: first.id.clone(),
                other: route.id.clone(),
                reason,
            });
        }

        Ok(Self { fqdn, members })
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn namespace(&self) -> &str {
        &self.members[0].id.namespace
    }

    pub fn internal(&self) -> bool {
        self.members[0].internal
    }

    pub fn members(&self) -> &[RouteDeclaration] {
        &self.members
    }
}
