use super::*;
use crate::Summary;
use pretty_assertions::assert_eq;
use route_controller_k8s_api::{
    istio::{
        Destination, HTTPMatchRequest, HTTPRoute, HTTPRouteDestination, HeaderOperations,
        Headers, PortSelector, StringMatch, VirtualServiceSpec,
    },
    IntOrString, ResourceExt, ServicePort,
};

#[tokio::test(flavor = "current_thread")]
async fn weighted_paths_share_a_hostname() {
    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[("d1", None)]));
    h.apply_route(mk_route(
        "r2",
        "app",
        Some("/api"),
        &[("d2", Some(30)), ("d3", Some(70))],
    ));

    let summary = h.reconcile("r1").await;
    assert_eq!(
        summary,
        Summary {
            created: 2,
            ..Default::default()
        }
    );
    let summary = h.reconcile("r2").await;
    assert_eq!(
        summary,
        Summary {
            created: 2,
            unchanged: 1,
            ..Default::default()
        }
    );

    let name = vs_name("app.example.com");
    assert_eq!(
        h.cluster.names(),
        vec![
            "Service ns-0/s-d1".to_string(),
            "Service ns-0/s-d2".to_string(),
            "Service ns-0/s-d3".to_string(),
            format!("VirtualService ns-0/{name}"),
        ]
    );

    let Some(ManagedObject::VirtualService(vs)) = h.cluster.get(ManagedKind::VirtualService, &name)
    else {
        panic!("missing VirtualService");
    };
    let backend = |guid: &str, weight: i32| HTTPRouteDestination {
        destination: Destination {
            host: format!("s-{guid}"),
            port: Some(PortSelector { number: 8080 }),
        },
        weight: Some(weight),
        headers: Some(Headers {
            request: Some(HeaderOperations { set: headers(guid) }),
        }),
    };
    assert_eq!(
        vs.spec,
        VirtualServiceSpec {
            hosts: vec!["app.example.com".to_string()],
            gateways: vec![GATEWAY.to_string()],
            http: vec![
                HTTPRoute {
                    matches: vec![HTTPMatchRequest {
                        uri: Some(StringMatch::Prefix("/api".to_string())),
                    }],
                    route: vec![backend("d2", 30), backend("d3", 70)],
                },
                HTTPRoute {
                    matches: vec![],
                    route: vec![backend("d1", 100)],
                },
            ],
        }
    );
    assert_eq!(
        vs.annotations().get("cloudfoundry.org/fqdn").map(String::as_str),
        Some("app.example.com")
    );
    assert_eq!(
        vs.owner_references()
            .iter()
            .map(|o| (o.name.as_str(), o.uid.as_str()))
            .collect::<Vec<_>>(),
        vec![("r1", "uid-r1"), ("r2", "uid-r2")]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn second_pass_changes_nothing() {
    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[("d1", None), ("d2", None)]));
    h.apply_route(mk_route("r2", "app", Some("/api"), &[("d3", None)]));
    h.reconcile("r1").await;
    h.reconcile("r2").await;
    let before = h.cluster.names();

    for name in ["r1", "r2"] {
        let summary = h.reconcile(name).await;
        assert_eq!(summary.created + summary.updated + summary.deleted, 0, "{summary:?}");
        assert!(summary.unchanged > 0);
    }
    assert_eq!(h.cluster.names(), before);
}

#[tokio::test(flavor = "current_thread")]
async fn services_follow_destinations() {
    let h = Harness::istio();
    h.apply_route(mk_route(
        "r1",
        "app",
        None,
        &[("a", None), ("b", None), ("c", None)],
    ));
    h.reconcile("r1").await;
    assert_eq!(h.cluster.service_names(), vec!["s-a", "s-b", "s-c"]);

    let Some(ManagedObject::Service(svc)) = h.cluster.get(ManagedKind::Service, "s-a") else {
        panic!("missing service");
    };
    assert_eq!(
        svc.labels(),
        &btreemap! {
            "cloudfoundry.org/app_guid".to_string() => "app-a".to_string(),
            "cloudfoundry.org/process_type".to_string() => "web".to_string(),
            "cloudfoundry.org/route_guid".to_string() => "r1".to_string(),
        }
    );
    let spec = svc.spec.clone().unwrap_or_default();
    assert_eq!(
        spec.ports,
        Some(vec![ServicePort {
            name: Some("http".to_string()),
            port: 8080,
            protocol: Some("TCP".to_string()),
            target_port: Some(IntOrString::Int(8080)),
            ..Default::default()
        }])
    );

    h.apply_route(mk_route("r1", "app", None, &[("b", None), ("c", None)]));
    let summary = h.reconcile("r1").await;
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.unchanged, 2, "s-b and s-c are left alone");
    assert_eq!(summary.updated, 1, "the routing object drops s-a");
    assert_eq!(h.cluster.service_names(), vec!["s-b", "s-c"]);
}

#[tokio::test(flavor = "current_thread")]
async fn deleted_route_is_cleaned_up() {
    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[("d1", None)]));
    h.reconcile("r1").await;
    assert_eq!(h.cluster.names().len(), 2);

    h.delete_route("r1");
    let summary = h.reconcile("r1").await;
    assert_eq!(
        summary,
        Summary {
            deleted: 2,
            ..Default::default()
        }
    );
    assert!(h.cluster.names().is_empty());

    // Nothing is left to do once the route's objects are gone.
    assert_eq!(h.reconcile("r1").await, Summary::default());
}

#[tokio::test(flavor = "current_thread")]
async fn deleting_one_route_keeps_the_shared_hostname() {
    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[("d1", None)]));
    h.apply_route(mk_route("r2", "app", Some("/api"), &[("d2", None)]));
    h.reconcile("r1").await;
    h.reconcile("r2").await;

    h.delete_route("r2");
    let summary = h.reconcile("r2").await;
    assert_eq!(summary.deleted, 1, "only s-d2 goes away");
    assert_eq!(summary.updated, 1, "the routing object drops r2");

    let name = vs_name("app.example.com");
    let Some(ManagedObject::VirtualService(vs)) = h.cluster.get(ManagedKind::VirtualService, &name)
    else {
        panic!("missing VirtualService");
    };
    assert_eq!(vs.spec.http.len(), 1);
    assert_eq!(vs.owner_references().len(), 1);
    assert_eq!(h.cluster.service_names(), vec!["s-d1"]);
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_update_withdraws_the_route() {
    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[("d1", None)]));
    h.apply_route(mk_route("r2", "app", Some("/api"), &[("d2", None)]));
    h.reconcile("r1").await;
    h.reconcile("r2").await;

    let mut invalid = mk_route("r1", "app", None, &[("d3", None)]);
    invalid.spec.destinations[0].port = Some(70000);
    h.apply_route(invalid);

    let summary = h.reconcile("r1").await;
    assert_eq!(summary.deleted, 1, "s-d1 is collected");
    assert_eq!(summary.updated, 1, "the routing object drops r1");
    assert_eq!(h.cluster.service_names(), vec!["s-d2"]);

    let Some(ManagedObject::VirtualService(vs)) =
        h.cluster.get(ManagedKind::VirtualService, &vs_name("app.example.com"))
    else {
        panic!("missing VirtualService");
    };
    assert_eq!(vs.spec.http.len(), 1);
    assert_eq!(
        vs.spec.http[0].matches,
        vec![HTTPMatchRequest {
            uri: Some(StringMatch::Prefix("/api".to_string())),
        }]
    );
    assert_eq!(
        vs.owner_references()
            .iter()
            .map(|o| o.name.as_str())
            .collect::<Vec<_>>(),
        vec!["r2"]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn moved_route_leaves_its_old_hostname() {
    let h = Harness::contour();
    h.apply_route(mk_route("r1", "old", None, &[("d1", None)]));
    h.reconcile("r1").await;

    h.apply_route(mk_route("r1", "new", None, &[("d1", None)]));
    let summary = h.reconcile("r1").await;
    assert_eq!(summary.created, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.updated, 1, "the service's fqdn annotation changes");

    assert_eq!(
        h.cluster.names(),
        vec![
            "Service ns-0/s-d1".to_string(),
            format!("HTTPProxy ns-0/{}", vs_name("new.example.com")),
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_hostnames_are_skipped() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .try_init()
        .ok();

    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[("d1", None)]));
    let mut internal = mk_route("r2", "app", Some("/api"), &[("d2", None)]);
    internal.spec.domain.internal = true;
    h.apply_route(internal);
    h.apply_route(mk_route("r3", "mixed", None, &[("d3", Some(50)), ("d4", None)]));

    let summary = h.reconcile("r1").await;
    assert_eq!(summary.invalid, vec!["app.example.com".to_string()]);
    assert_eq!(summary.created, 1, "services are still applied");

    let summary = h.reconcile("r3").await;
    assert_eq!(summary.invalid, vec!["mixed.example.com".to_string()]);
    assert_eq!(h.cluster.service_names(), vec!["s-d1", "s-d3", "s-d4"]);
    assert!(h
        .cluster
        .names()
        .iter()
        .all(|name| name.starts_with("Service ")));
}

#[tokio::test(flavor = "current_thread")]
async fn route_without_destinations_gets_a_placeholder() {
    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[]));
    let summary = h.reconcile("r1").await;
    assert_eq!(summary.created, 1);

    let Some(ManagedObject::VirtualService(vs)) =
        h.cluster.get(ManagedKind::VirtualService, &vs_name("app.example.com"))
    else {
        panic!("missing VirtualService");
    };
    assert_eq!(
        vs.spec.http,
        vec![HTTPRoute {
            matches: vec![],
            route: vec![HTTPRouteDestination {
                destination: Destination {
                    host: "no-destinations".to_string(),
                    port: None,
                },
                weight: None,
                headers: None,
            }],
        }]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn write_failures_are_returned() {
    let h = Harness::istio();
    h.apply_route(mk_route("r1", "app", None, &[("d1", None)]));
    h.cluster.set_unavailable(true);

    let res = h.reconciler.reconcile(&RouteId::new("ns-0", "r1")).await;
    assert!(
        matches!(res, Err(crate::Error::Apply(ApplyError::Timeout(_)))),
        "{res:?}"
    );

    h.cluster.set_unavailable(false);
    assert_eq!(h.reconcile("r1").await.created, 2);
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_routes_are_ignored() {
    let h = Harness::istio();
    assert_eq!(h.reconcile("nope").await, Summary::default());
}
