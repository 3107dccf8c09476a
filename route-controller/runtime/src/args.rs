use crate::{
    index::{Index, IndexMetrics},
    k8s::{self, labels, Client, Resource},
    lease,
    reconcile::{
        self, Contour, Controller, ControllerMetrics, Istio, KubeApply, Provider, Reconciler,
        WriteLease,
    },
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use tokio::{sync::mpsc, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "route-controller",
    about = "Reconciles routes into backend services and ingress configuration"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "route_controller=info,warn",
        env = "ROUTE_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The ingress technology to configure: `istio` or `contour`.
    #[clap(long, default_value = "istio", env = "INGRESS_PROVIDER")]
    ingress_provider: IngressProvider,

    /// The Istio gateway external hostnames are bound to.
    #[clap(
        long,
        default_value = "istio-ingress/cf-ingress-gateway",
        env = "ISTIO_GATEWAY_NAME"
    )]
    istio_gateway: String,

    /// The TLS secret Contour serves for external hostnames.
    #[clap(long, env = "CONTOUR_TLS_SECRET_NAME")]
    contour_tls_secret_name: Option<String>,

    /// Disallows plaintext requests through Contour.
    #[clap(long, env = "CONTOUR_HTTPS_ONLY")]
    contour_https_only: bool,

    /// Seconds between resyncs of every route.
    #[clap(
        long,
        default_value = "30",
        env = "RESYNC_INTERVAL",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    resync_interval: u64,

    /// Routes reconciled concurrently.
    #[clap(long, default_value = "4")]
    concurrency: usize,

    #[clap(long, default_value = "5000")]
    patch_timeout_ms: u64,

    /// Only the holder of the write lease mutates the cluster.
    #[clap(long, env = "LEADER_ELECTION_ENABLED")]
    enable_leader_election: bool,

    /// Namespace of the write lease.
    #[clap(long, default_value = "cf-system", env = "LEADER_ELECTION_NAMESPACE")]
    controller_namespace: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum IngressProvider {
    Istio,
    Contour,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            ingress_provider,
            istio_gateway,
            contour_tls_secret_name,
            contour_https_only,
            resync_interval,
            concurrency,
            patch_timeout_ms,
            enable_leader_election,
            controller_namespace,
        } = self;

        let provider = match ingress_provider {
            IngressProvider::Istio => Provider::from(Istio {
                gateway: istio_gateway,
            }),
            IngressProvider::Contour => Provider::from(Contour {
                tls_secret_name: contour_tls_secret_name,
                https_only: contour_https_only,
            }),
        };

        // The index notifies the controller of every route whose desired
        // state may have changed.
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let index = Index::shared(queue_tx.clone());

        let mut prom = <Registry>::default();
        let index_metrics =
            IndexMetrics::register(index.clone(), prom.sub_registry_with_prefix("index")).shared();
        let controller_metrics =
            ControllerMetrics::register(prom.sub_registry_with_prefix("controller"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Neither the routes nor the routing objects can be reconciled
        // without their resource kinds.
        ensure_api_resource::<k8s::Route>(&runtime.client()).await?;
        match provider.kind() {
            k8s::ManagedKind::HttpProxy => {
                ensure_api_resource::<k8s::HTTPProxy>(&runtime.client()).await?
            }
            k8s::ManagedKind::VirtualService => {
                ensure_api_resource::<k8s::VirtualService>(&runtime.client()).await?
            }
            k8s::ManagedKind::Service => {}
        }

        let hostname =
            std::env::var("HOSTNAME").context("Failed to fetch `HOSTNAME` environment variable")?;
        let claims = if enable_leader_election {
            lease::init(&runtime, &controller_namespace, &hostname).await?
        } else {
            lease::permanent(&hostname)
        };
        let lease = WriteLease::new(claims, &hostname);

        // Spawn resource watches.

        let routes = runtime.watch_all::<k8s::Route>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index_metrics.clone(), routes).instrument(info_span!("routes")),
        );

        let services = runtime
            .watch_all::<k8s::Service>(watcher::Config::default().labels(labels::SERVICE_SELECTOR));
        tokio::spawn(
            kubert::index::namespaced(index_metrics.clone(), services)
                .instrument(info_span!("services")),
        );

        match provider.kind() {
            k8s::ManagedKind::HttpProxy => {
                let proxies = runtime.watch_all::<k8s::HTTPProxy>(watcher::Config::default());
                tokio::spawn(
                    kubert::index::namespaced(index_metrics, proxies)
                        .instrument(info_span!("httpproxies")),
                );
            }
            k8s::ManagedKind::VirtualService => {
                let vss = runtime.watch_all::<k8s::VirtualService>(watcher::Config::default());
                tokio::spawn(
                    kubert::index::namespaced(index_metrics, vss)
                        .instrument(info_span!("virtualservices")),
                );
            }
            k8s::ManagedKind::Service => {}
        }

        // Spawn the periodic resync and the controller.
        tokio::spawn(
            reconcile::resync(
                index.clone(),
                queue_tx.clone(),
                lease.clone(),
                Duration::from_secs(resync_interval),
            )
            .instrument(info_span!("resync")),
        );

        let apply = KubeApply::new(runtime.client(), Duration::from_millis(patch_timeout_ms));
        let reconciler = Reconciler::new(index, apply, provider, controller_metrics.clone());
        let controller = Controller::new(
            reconciler,
            lease,
            queue_tx,
            concurrency,
            controller_metrics,
        );
        tokio::spawn(
            controller
                .run(queue_rx, runtime.shutdown_handle())
                .instrument(info_span!("controller")),
        );

        info!(%hostname, ?ingress_provider, "Route controller running");

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

impl std::str::FromStr for IngressProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "istio" => Ok(Self::Istio),
            "contour" => Ok(Self::Contour),
            s => bail!("invalid ingress provider: {s}"),
        }
    }
}

/// Fails unless the API server serves `T`.
async fn ensure_api_resource<T>(client: &Client) -> Result<()>
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    let exists = client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt));
    if !exists {
        bail!(
            "{} resource kind not found in {}",
            T::kind(&dt),
            T::api_version(&dt)
        );
    }
    Ok(())
}
