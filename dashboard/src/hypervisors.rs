use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::numa::{build_display_model, DisplayModel};
use crate::stats::{aggregate, AggregateStats};
use crate::topology::{merge_instances, nodes_from_hypervisor, InstanceRecord};
use crate::SharedState;

const STATS_UNAVAILABLE: &str = "Unable to retrieve hypervisor statistics.";
const CONTAINER_STATS_UNAVAILABLE: &str = "Unable to retrieve container host statistics.";
const INSTANCES_UNAVAILABLE: &str = "Unable to retrieve hypervisor instances list.";
const TOPOLOGY_UNAVAILABLE: &str = "Unable to retrieve hypervisor NUMA topology.";
const CONTAINER_HOST_UNAVAILABLE: &str = "Unable to retrieve container host details.";

// -----------------------------------------------------------------------------
// Responses
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: AggregateStats,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServersResponse {
    pub instances: Vec<InstanceRecord>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NumaView {
    pub hypervisor_name: String,
    pub breadcrumb: Vec<(String, Option<String>)>,
    pub model: DisplayModel,
    pub warnings: Vec<String>,
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

/// GET /api/hypervisors/stats
/// Index page counters across both services.
pub async fn stats(State(state): State<SharedState>) -> Json<StatsResponse> {
    let mut warnings = Vec::new();

    let compute = recover(
        state.compute.hypervisor_statistics().await,
        STATS_UNAVAILABLE,
        &mut warnings,
    );
    let hosts = recover(
        state.container.list_hosts().await,
        CONTAINER_STATS_UNAVAILABLE,
        &mut warnings,
    )
    .unwrap_or_default();

    Json(StatsResponse {
        stats: aggregate(compute.as_ref(), &hosts),
        warnings,
    })
}

/// GET /api/hypervisors/{id}_{name}/servers
/// Servers of the hypervisor with that id among those matching the name.
pub async fn servers(
    State(state): State<SharedState>,
    Path(hypervisor): Path<String>,
) -> Result<Json<ServersResponse>, StatusCode> {
    let (id, name) = split_hypervisor(&hypervisor)?;
    let mut warnings = Vec::new();

    let mut servers = Vec::new();
    if let Some(found) = recover(
        state.compute.hypervisor_servers(name).await,
        INSTANCES_UNAVAILABLE,
        &mut warnings,
    ) {
        for hv in found.into_iter().filter(|h| h.id == id) {
            servers.extend(hv.servers);
        }
    }

    Ok(Json(ServersResponse {
        instances: merge_instances(servers, Vec::new()),
        warnings,
    }))
}

/// GET /api/hypervisors/{id}_{name}/numa
/// NUMA widget data for one host: compute servers and containers side by side.
pub async fn numa(
    State(state): State<SharedState>,
    Path(hypervisor): Path<String>,
) -> Result<Json<NumaView>, StatusCode> {
    let (_, name) = split_hypervisor(&hypervisor)?;
    let mut warnings = Vec::new();

    // Not-found counts as unavailable: empty contribution plus a warning.
    let hv = match recover(
        state.compute.hypervisor_servers(name).await,
        TOPOLOGY_UNAVAILABLE,
        &mut warnings,
    ) {
        Some(found) => {
            let hv = found.into_iter().find(|h| h.hypervisor_hostname == name);
            if hv.is_none() {
                info!("no compute hypervisor named {}", name);
                warnings.push(TOPOLOGY_UNAVAILABLE.to_string());
            }
            hv
        }
        None => None,
    };

    let host = match recover(
        state.container.host_show(name).await,
        CONTAINER_HOST_UNAVAILABLE,
        &mut warnings,
    ) {
        Some(h) if h.hostname == name => Some(h),
        Some(h) => {
            info!("container host {} does not match {}", h.hostname, name);
            warnings.push(CONTAINER_HOST_UNAVAILABLE.to_string());
            None
        }
        None => None,
    };

    let fallback_memory = host.as_ref().map(|h| h.mem_total).filter(|m| *m > 0);
    let (nodes, servers) = match hv {
        Some(hv) => (nodes_from_hypervisor(&hv, fallback_memory), hv.servers),
        None => (Vec::new(), Vec::new()),
    };
    let containers = host.map(|h| h.containers).unwrap_or_default();
    let instances = merge_instances(servers, containers);

    Ok(Json(NumaView {
        hypervisor_name: name.to_string(),
        breadcrumb: vec![(name.to_string(), None)],
        model: build_display_model(&nodes, &instances),
        warnings,
    }))
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Splits `{id}_{name}` at the first underscore.
fn split_hypervisor(raw: &str) -> Result<(&str, &str), StatusCode> {
    match raw.split_once('_') {
        Some((id, name)) if !id.is_empty() && !name.is_empty() => Ok((id, name)),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

/// A failed lookup becomes a user-facing warning and an empty contribution.
fn recover<T>(res: anyhow::Result<T>, warning: &str, warnings: &mut Vec<String>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("{} ({:#})", warning, e);
            warnings.push(warning.to_string());
            None
        }
    }
}
