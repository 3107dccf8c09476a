//! Converts desired state into Kubernetes objects.

use route_controller_core::{backend::DEFAULT_PORT, DesiredService, RouteRef, VirtualHost};
use route_controller_k8s_api::{
    labels, IntOrString, ObjectMeta, OwnerReference, Resource, Route, Service, ServicePort,
    ServiceSpec,
};
use std::collections::BTreeMap;

pub(crate) fn owner_reference(owner: &RouteRef) -> OwnerReference {
    OwnerReference {
        api_version: Route::api_version(&()).to_string(),
        kind: Route::kind(&()).to_string(),
        name: owner.id.name.clone(),
        uid: owner.uid.clone(),
        ..Default::default()
    }
}

pub(crate) fn service(desired: &DesiredService) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(desired.name.clone()),
            namespace: Some(desired.namespace.clone()),
            labels: Some(desired.labels.clone()),
            annotations: Some(desired.annotations.clone()),
            owner_references: Some(vec![owner_reference(&desired.owner)]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(desired.selector.clone()),
            // Every field the API server would otherwise default is set here so
            // that an unchanged service compares equal on the next pass.
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: i32::from(desired.port),
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(i32::from(desired.port))),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

pub(crate) fn routing_metadata(vhost: &VirtualHost) -> ObjectMeta {
    ObjectMeta {
        name: Some(vhost.name.clone()),
        namespace: Some(vhost.namespace.clone()),
        annotations: Some(BTreeMap::from([(
            labels::FQDN_ANNOTATION.to_string(),
            vhost.fqdn.clone(),
        )])),
        owner_references: Some(vhost.owners.iter().map(owner_reference).collect()),
        ..Default::default()
    }
}

/// Routing objects must name a port; the placeholder backend has none.
pub(crate) fn backend_port(port: Option<u16>) -> u16 {
    port.unwrap_or(DEFAULT_PORT)
}
