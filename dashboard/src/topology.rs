use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::backends::Hypervisor;

// -----------------------------------------------------------------------------
// Data Structures
// -----------------------------------------------------------------------------

/// Which inventory service reported a workload.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Compute,
    Container,
}

/// Per-node CPU and memory pinning of one workload, keyed by node id.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct NumaPinning {
    #[serde(default)]
    pub cpu: IndexMap<String, Vec<u32>>,
    #[serde(default)]
    pub memory: IndexMap<String, u64>,
}

impl NumaPinning {
    /// Node ids mentioned by either the CPU or the memory map, CPU keys first.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.cpu.keys().map(String::as_str).collect();
        for id in self.memory.keys() {
            if !ids.contains(&id.as_str()) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn references(&self, node_id: &str) -> bool {
        self.cpu.contains_key(node_id) || self.memory.contains_key(node_id)
    }
}

/// A server or container running on a host, in the shape both services share.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InstanceRecord {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub hostname: String,
    pub name: String,
    #[serde(default)]
    pub vcpus: u32,
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default, deserialize_with = "lenient_pinning")]
    pub numa_topology: Option<NumaPinning>,
    #[serde(default)]
    pub source: Source,
}

/// One NUMA cell of a host.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NumaNode {
    pub id: String,
    pub cpuset: Vec<u32>,
    pub siblings: Vec<[u32; 2]>,
    pub memory_mb: u64,
}

// -----------------------------------------------------------------------------
// Normalization
// -----------------------------------------------------------------------------

/// Builds the host's NUMA nodes from a compute hypervisor record.
///
/// Cells that do not report their own memory get an even share of the
/// hypervisor's memory, or of `fallback_host_memory` when the hypervisor
/// does not report it either. The shares always add up to the host total.
pub fn nodes_from_hypervisor(hv: &Hypervisor, fallback_host_memory: Option<u64>) -> Vec<NumaNode> {
    let host_memory = hv.memory_mb.or(fallback_host_memory).unwrap_or(0);
    let shares = split_evenly(host_memory, hv.numa_topology.len());

    hv.numa_topology
        .iter()
        .zip(shares)
        .map(|(cell, share)| NumaNode {
            id: cell.id.clone(),
            cpuset: cell.cpuset.clone(),
            siblings: normalize_siblings(&cell.siblings),
            memory_mb: cell.memory.unwrap_or(share),
        })
        .collect()
}

/// Sorts each hyperthread pair ascending, then the pairs themselves.
/// Entries that are not pairs are dropped.
pub fn normalize_siblings(pairs: &[Vec<u32>]) -> Vec<[u32; 2]> {
    let mut out: Vec<[u32; 2]> = pairs
        .iter()
        .filter_map(|p| match p.as_slice() {
            [a, b] => Some([*a.min(b), *a.max(b)]),
            _ => None,
        })
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Compute servers first, then containers, each in the order the service returned them.
pub fn merge_instances(
    servers: Vec<InstanceRecord>,
    containers: Vec<InstanceRecord>,
) -> Vec<InstanceRecord> {
    let tagged_servers = servers.into_iter().map(|mut s| {
        s.source = Source::Compute;
        s
    });
    let tagged_containers = containers.into_iter().map(|mut c| {
        c.source = Source::Container;
        c
    });
    tagged_servers.chain(tagged_containers).collect()
}

fn split_evenly(total: u64, parts: usize) -> Vec<u64> {
    if parts == 0 {
        return Vec::new();
    }
    let parts_u64 = parts as u64;
    let base = total / parts_u64;
    let remainder = (total % parts_u64) as usize;
    (0..parts)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

// -----------------------------------------------------------------------------
// Serde helpers
// -----------------------------------------------------------------------------

/// Accepts missing, null or malformed pinning data as "no pinning".
fn lenient_pinning<'de, D>(de: D) -> Result<Option<NumaPinning>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(de)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(v) => match serde_json::from_value::<NumaPinning>(v) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!("ignoring malformed numa_topology: {}", e);
                None
            }
        },
    })
}

/// Ids arrive as integers from some API versions and as strings from others.
pub fn stringified<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or integer id, got {}",
            other
        ))),
    }
}
