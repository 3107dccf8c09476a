use super::*;
use kube::api::ObjectMeta;
use kubert::index::IndexNamespacedResource;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use route_controller_core::RouteId;
use route_controller_k8s_api::{
    self as k8s,
    route::{AppProcess, DestinationApp, DestinationSelector, RouteDestination, RouteDomain},
    ManagedKind, ObjectRef, OwnerReference,
};
use tokio::sync::mpsc;

#[test]
fn routes_are_grouped_by_hostname() {
    let (mut idx, mut rx) = mk_index();

    idx.apply(mk_route("ns-0", "r2", "uid-2", "app", Some("/api")));
    idx.apply(mk_route("ns-0", "r1", "uid-1", "app", None));
    idx.apply(mk_route("ns-0", "r3", "uid-3", "other", None));
    idx.apply(mk_route("ns-1", "r4", "uid-4", "app", None));
    assert_eq!(
        drain(&mut rx),
        vec![
            RouteId::new("ns-0", "r2"),
            RouteId::new("ns-0", "r1"),
            RouteId::new("ns-0", "r3"),
            RouteId::new("ns-1", "r4"),
        ]
    );

    let group = idx.list_by_hostname("ns-0", "app.example.com");
    assert_eq!(
        group.iter().map(|r| r.id.name.as_str()).collect::<Vec<_>>(),
        vec!["r1", "r2"],
        "groups are ordered by identity and scoped to a namespace"
    );
    assert_eq!(idx.list_by_hostname("ns-1", "app.example.com").len(), 1);
    assert!(idx.list_by_hostname("ns-0", "nope.example.com").is_empty());
    assert_eq!(idx.route_ids().len(), 4);
}

#[test]
fn unchanged_routes_are_not_requeued() {
    let (mut idx, mut rx) = mk_index();

    let route = mk_route("ns-0", "r1", "uid-1", "app", None);
    idx.apply(route.clone());
    assert_eq!(drain(&mut rx).len(), 1);

    let mut status_only = route.clone();
    status_only.metadata.resource_version = Some("2".to_string());
    idx.apply(status_only);
    assert!(drain(&mut rx).is_empty());

    let mut moved = route;
    moved.spec.host = "moved".to_string();
    idx.apply(moved);
    assert_eq!(drain(&mut rx), vec![RouteId::new("ns-0", "r1")]);
    assert!(idx.list_by_hostname("ns-0", "app.example.com").is_empty());
    assert_eq!(
        idx.get(&RouteId::new("ns-0", "r1")).unwrap().fqdn,
        "moved.example.com"
    );
}

#[test]
fn invalid_routes_are_ignored() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .try_init()
        .ok();

    let (mut idx, mut rx) = mk_index();

    let mut route = mk_route("ns-0", "r1", "uid-1", "app", None);
    route.metadata.uid = None;
    idx.apply(route);

    assert!(drain(&mut rx).is_empty());
    assert!(idx.route_ids().is_empty());
}

#[test]
fn invalid_updates_stop_serving_the_route() {
    let (mut idx, mut rx) = mk_index();

    let route = mk_route("ns-0", "r1", "uid-1", "app", None);
    idx.apply(route.clone());
    idx.apply(mk_route("ns-0", "r2", "uid-2", "app", Some("/api")));
    idx.apply(mk_service("ns-0", "s-dst-r1", &["uid-1"]));
    drain(&mut rx);

    let mut invalid = route;
    invalid.spec.destinations[0].port = Some(70000);
    idx.apply(invalid);

    assert_eq!(
        drain(&mut rx),
        vec![RouteId::new("ns-0", "r1"), RouteId::new("ns-0", "r2")]
    );
    let id = RouteId::new("ns-0", "r1");
    assert_eq!(idx.get(&id), None);
    assert_eq!(
        idx.tombstone(&id),
        Some(Tombstone {
            uid: "uid-1".to_string(),
            fqdn: "app.example.com".to_string(),
        })
    );
    assert_eq!(
        idx.list_by_hostname("ns-0", "app.example.com")
            .iter()
            .map(|r| r.id.name.as_str())
            .collect::<Vec<_>>(),
        vec!["r2"]
    );
}

#[test]
fn objects_are_indexed_by_owner() {
    let (mut idx, _rx) = mk_index();

    idx.apply(mk_service("ns-0", "s-d1", &["uid-1", "uid-2"]));
    idx.apply(mk_service("ns-0", "s-d2", &["uid-1"]));
    idx.apply(mk_proxy("ns-0", "vs-abc", "app.example.com", &["uid-1"]));

    assert_eq!(
        idx.list_owned_by(ManagedKind::Service, "uid-1"),
        vec![
            OwnedObject {
                reference: ObjectRef::new(ManagedKind::Service, "ns-0", "s-d1"),
                fqdn: Some("app.example.com".to_string()),
            },
            OwnedObject {
                reference: ObjectRef::new(ManagedKind::Service, "ns-0", "s-d2"),
                fqdn: Some("app.example.com".to_string()),
            },
        ]
    );
    assert_eq!(
        idx.list_owned_by(ManagedKind::HttpProxy, "uid-1"),
        vec![OwnedObject {
            reference: ObjectRef::new(ManagedKind::HttpProxy, "ns-0", "vs-abc"),
            fqdn: Some("app.example.com".to_string()),
        }]
    );
    assert!(idx
        .list_owned_by(ManagedKind::VirtualService, "uid-1")
        .is_empty());

    // Dropping an owner reference drops the object from that owner's set.
    idx.apply(mk_service("ns-0", "s-d1", &["uid-2"]));
    assert_eq!(idx.list_owned_by(ManagedKind::Service, "uid-1").len(), 1);
    assert_eq!(idx.list_owned_by(ManagedKind::Service, "uid-2").len(), 1);

    IndexNamespacedResource::<k8s::Service>::delete(
        &mut idx,
        "ns-0".to_string(),
        "s-d2".to_string(),
    );
    assert!(idx.list_owned_by(ManagedKind::Service, "uid-1").is_empty());
}

#[test]
fn deleting_a_route_leaves_a_tombstone_while_it_owns_objects() {
    let (mut idx, mut rx) = mk_index();

    idx.apply(mk_route("ns-0", "r1", "uid-1", "app", None));
    idx.apply(mk_route("ns-0", "r2", "uid-2", "app", Some("/api")));
    idx.apply(mk_service("ns-0", "s-d1", &["uid-1"]));
    idx.apply(mk_proxy("ns-0", "vs-abc", "app.example.com", &["uid-1", "uid-2"]));
    drain(&mut rx);

    IndexNamespacedResource::<k8s::Route>::delete(&mut idx, "ns-0".to_string(), "r1".to_string());
    assert_eq!(
        drain(&mut rx),
        vec![RouteId::new("ns-0", "r1"), RouteId::new("ns-0", "r2")],
        "the rest of the hostname group is requeued"
    );
    assert_eq!(idx.get(&RouteId::new("ns-0", "r1")), None);
    assert_eq!(
        idx.tombstone(&RouteId::new("ns-0", "r1")),
        Some(Tombstone {
            uid: "uid-1".to_string(),
            fqdn: "app.example.com".to_string(),
        })
    );

    // Once the reconciler has cleaned up, the tombstone goes away.
    IndexNamespacedResource::<k8s::Service>::delete(
        &mut idx,
        "ns-0".to_string(),
        "s-d1".to_string(),
    );
    assert!(idx.tombstone(&RouteId::new("ns-0", "r1")).is_some());
    idx.apply(mk_proxy("ns-0", "vs-abc", "app.example.com", &["uid-2"]));
    assert_eq!(idx.tombstone(&RouteId::new("ns-0", "r1")), None);
}

#[test]
fn deleting_a_route_that_owns_nothing_leaves_no_tombstone() {
    let (mut idx, mut rx) = mk_index();

    idx.apply(mk_route("ns-0", "r1", "uid-1", "app", None));
    drain(&mut rx);

    IndexNamespacedResource::<k8s::Route>::delete(&mut idx, "ns-0".to_string(), "r1".to_string());
    assert_eq!(drain(&mut rx), vec![RouteId::new("ns-0", "r1")]);
    assert_eq!(idx.tombstone(&RouteId::new("ns-0", "r1")), None);

    // Deleting an unknown route is a no-op.
    IndexNamespacedResource::<k8s::Route>::delete(&mut idx, "ns-0".to_string(), "r1".to_string());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn deleted_objects_requeue_their_owners() {
    let (mut idx, mut rx) = mk_index();

    idx.apply(mk_route("ns-0", "r1", "uid-1", "app", None));
    idx.apply(mk_virtual_service("ns-0", "vs-abc", "app.example.com", &["uid-1", "uid-gone"]));
    drain(&mut rx);

    IndexNamespacedResource::<k8s::VirtualService>::delete(
        &mut idx,
        "ns-0".to_string(),
        "vs-abc".to_string(),
    );
    assert_eq!(drain(&mut rx), vec![RouteId::new("ns-0", "r1")]);
}

#[test]
fn route_applies_are_counted() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut prom = prometheus_client::registry::Registry::default();
    let idx = Index::shared(tx);
    let mut metrics = IndexMetrics::register(idx.clone(), &mut prom);

    metrics.apply(mk_route("ns-0", "r1", "uid-1", "app", None));
    metrics.apply(mk_route("ns-0", "r2", "uid-2", "app", None));
    assert_eq!(idx.route_ids().len(), 2);

    let mut buf = String::new();
    prometheus_client::encoding::text::encode(&mut buf, &prom).unwrap();
    assert!(
        buf.contains(r#"objects{namespace="ns-0",kind="Route"} 2"#),
        "{buf}"
    );
    assert!(
        buf.contains(r#"applies_total{namespace="ns-0",kind="Route"} 2"#),
        "{buf}"
    );
}

// === helpers ===

fn mk_index() -> (Index, mpsc::UnboundedReceiver<RouteId>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let idx = Index::shared(tx);
    let idx = std::sync::Arc::try_unwrap(idx)
        .ok()
        .expect("index must not be shared")
        .into_inner();
    (idx, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RouteId>) -> Vec<RouteId> {
    let mut ids = Vec::new();
    while let Ok(id) = rx.try_recv() {
        ids.push(id);
    }
    ids
}

fn mk_route(ns: &str, name: &str, uid: &str, host: &str, path: Option<&str>) -> k8s::Route {
    k8s::Route {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        spec: k8s::RouteSpec {
            host: host.to_string(),
            path: path.map(Into::into),
            url: None,
            domain: RouteDomain {
                name: "example.com".to_string(),
                internal: false,
            },
            destinations: vec![RouteDestination {
                guid: format!("dst-{name}"),
                port: None,
                weight: None,
                app: DestinationApp {
                    guid: "app-0".to_string(),
                    process: AppProcess {
                        type_: "web".to_string(),
                    },
                },
                selector: DestinationSelector::default(),
            }],
        },
    }
}

fn mk_meta(ns: &str, name: &str, annotation: &str, fqdn: &str, owners: &[&str]) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        annotations: Some(btreemap! { annotation.to_string() => fqdn.to_string() }),
        owner_references: Some(
            owners
                .iter()
                .map(|uid| OwnerReference {
                    api_version: "networking.cloudfoundry.org/v1alpha1".to_string(),
                    kind: "Route".to_string(),
                    name: uid.trim_start_matches("uid-").to_string(),
                    uid: uid.to_string(),
                    ..Default::default()
                })
                .collect(),
        ),
        ..Default::default()
    }
}

fn mk_service(ns: &str, name: &str, owners: &[&str]) -> k8s::Service {
    k8s::Service {
        metadata: mk_meta(
            ns,
            name,
            k8s::labels::ROUTE_FQDN_ANNOTATION,
            "app.example.com",
            owners,
        ),
        ..Default::default()
    }
}

fn mk_proxy(ns: &str, name: &str, fqdn: &str, owners: &[&str]) -> k8s::HTTPProxy {
    k8s::HTTPProxy {
        metadata: mk_meta(ns, name, k8s::labels::FQDN_ANNOTATION, fqdn, owners),
        spec: Default::default(),
    }
}

fn mk_virtual_service(ns: &str, name: &str, fqdn: &str, owners: &[&str]) -> k8s::VirtualService {
    k8s::VirtualService {
        metadata: mk_meta(ns, name, k8s::labels::FQDN_ANNOTATION, fqdn, owners),
        spec: Default::default(),
    }
}
