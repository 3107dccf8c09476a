use crate::apply::Outcome;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use route_controller_k8s_api::ManagedKind;

#[derive(Clone, Debug, Default)]
pub struct ControllerMetrics {
    passes: Family<PassLabels, Counter>,
    mutations: Family<MutationLabels, Counter>,
    invalid_hostnames: Counter,
    requeues: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PassLabels {
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct MutationLabels {
    kind: String,
    op: &'static str,
}

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let passes = Family::default();
        prom.register(
            "passes",
            "Count of reconciliation passes by result",
            passes.clone(),
        );

        let mutations = Family::default();
        prom.register(
            "mutations",
            "Count of objects created, updated or deleted",
            mutations.clone(),
        );

        let invalid_hostnames = Counter::default();
        prom.register(
            "invalid_hostnames",
            "Count of hostname groups skipped because they failed validation",
            invalid_hostnames.clone(),
        );

        let requeues = Counter::default();
        prom.register(
            "requeues",
            "Count of routes requeued after a transient failure",
            requeues.clone(),
        );

        Self {
            passes,
            mutations,
            invalid_hostnames,
            requeues,
        }
    }

    pub(crate) fn pass(&self, result: &'static str) {
        self.passes.get_or_create(&PassLabels { result }).inc();
    }

    pub(crate) fn mutated(&self, kind: ManagedKind, outcome: Outcome) {
        let op = match outcome {
            Outcome::Created => "create",
            Outcome::Updated => "update",
            Outcome::Unchanged => return,
        };
        self.mutations
            .get_or_create(&MutationLabels {
                kind: kind.to_string(),
                op,
            })
            .inc();
    }

    pub(crate) fn deleted(&self, kind: ManagedKind) {
        self.mutations
            .get_or_create(&MutationLabels {
                kind: kind.to_string(),
                op: "delete",
            })
            .inc();
    }

    pub(crate) fn invalid_hostname(&self) {
        self.invalid_hostnames.inc();
    }

    pub(crate) fn requeued(&self) {
        self.requeues.inc();
    }
}
