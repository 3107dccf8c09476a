use crate::VirtualHost;

/// Shapes a virtual host into the spec of a concrete routing technology.
///
/// Implementations must be pure: the same virtual host always produces the
/// same spec, and no implementation may touch cluster state.
pub trait IngressProvider {
    type Spec;

    fn routing_spec(&self, vhost: &VirtualHost) -> Self::Spec;
}
