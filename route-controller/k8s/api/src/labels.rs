//! Well-known labels and annotations.

pub use route_controller_core::{
    backend::{APP_GUID_LABEL, PROCESS_TYPE_LABEL, ROUTE_FQDN_ANNOTATION, ROUTE_GUID_LABEL},
    routing::FQDN_ANNOTATION,
};

/// Set on routes by the API that creates them.
pub const ORG_GUID_LABEL: &str = "cloudfoundry.org/org_guid";
pub const SPACE_GUID_LABEL: &str = "cloudfoundry.org/space_guid";

/// Only services carrying this label are watched.
pub const SERVICE_SELECTOR: &str = ROUTE_GUID_LABEL;
