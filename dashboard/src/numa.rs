use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::grid::{cpu_grid, CpuGrid};
use crate::palette::{assign_colors, FREE};
use crate::topology::{InstanceRecord, NumaNode};

// -----------------------------------------------------------------------------
// Display model
// -----------------------------------------------------------------------------

/// Where an instance sits on one node: `0` when not pinned to it, otherwise
/// the pinned CPUs as `[cpu, hostname]` pairs in pinning order.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Unpinned,
    Pinned(Vec<(u32, String)>),
}

impl Serialize for Placement {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Placement::Unpinned => s.serialize_u8(0),
            Placement::Pinned(cpus) => cpus.serialize(s),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NodeDisplayModel {
    pub instances: IndexMap<String, Placement>,
    /// One `[mb]` entry per allocation on this node, then the free remainder.
    pub memory_data: Vec<[i64; 1]>,
    pub memory_name: Vec<String>,
    pub memory_hostname: Vec<String>,
    /// Negative when the node is overcommitted.
    pub memory_free: i64,
    pub cpu_col_row: CpuGrid,
    pub cpuset: Vec<u32>,
    pub siblings: Vec<[u32; 2]>,
}

/// An allocation that names a node the host does not have.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct UnplacedAllocation {
    pub instance: String,
    pub node_id: String,
    pub memory_mb: u64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DisplayModel {
    pub node_ids: Vec<String>,
    pub nodes: IndexMap<String, NodeDisplayModel>,
    pub colors: IndexMap<String, String>,
    pub unplaced: Vec<UnplacedAllocation>,
}

// -----------------------------------------------------------------------------
// Aggregation
// -----------------------------------------------------------------------------

/// Builds the per-node view of one host from its NUMA nodes and the merged
/// instance list. Pure: inputs are not modified and nothing is fetched.
pub fn build_display_model(nodes: &[NumaNode], instances: &[InstanceRecord]) -> DisplayModel {
    let mut node_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
    node_ids.sort_by(|a, b| node_order(a, b));
    node_ids.dedup();

    let mut by_id = IndexMap::with_capacity(node_ids.len());
    for id in &node_ids {
        // First descriptor wins when a host reports the same id twice.
        if let Some(node) = nodes.iter().find(|n| &n.id == id) {
            by_id.insert(id.clone(), node_model(node, instances));
        }
    }

    let unplaced = unplaced_allocations(&node_ids, instances);
    for u in &unplaced {
        warn!(
            "instance {} pins {} MB to unknown NUMA node {}",
            u.instance, u.memory_mb, u.node_id
        );
    }

    DisplayModel {
        node_ids,
        nodes: by_id,
        colors: assign_colors(instances),
        unplaced,
    }
}

fn node_model(node: &NumaNode, instances: &[InstanceRecord]) -> NodeDisplayModel {
    let mut model = NodeDisplayModel {
        instances: IndexMap::with_capacity(instances.len()),
        memory_data: Vec::new(),
        memory_name: Vec::new(),
        memory_hostname: Vec::new(),
        memory_free: to_signed(node.memory_mb),
        cpu_col_row: cpu_grid(node.cpuset.len()),
        cpuset: node.cpuset.clone(),
        siblings: node.siblings.clone(),
    };

    for inst in instances {
        // A repeated name keeps the placement an earlier record already set.
        model
            .instances
            .entry(inst.name.clone())
            .or_insert(Placement::Unpinned);

        let pinning = match &inst.numa_topology {
            Some(p) if p.references(&node.id) => p,
            _ => continue,
        };

        let memory = to_signed(pinning.memory.get(&node.id).copied().unwrap_or(0));
        model.memory_data.push([memory]);
        model.memory_name.push(inst.name.clone());
        model.memory_hostname.push(inst.hostname.clone());
        model.memory_free = model.memory_free.saturating_sub(memory);

        let cpus = match pinning.cpu.get(&node.id) {
            Some(c) if !c.is_empty() => c,
            _ => continue,
        };
        for cpu in cpus.iter().filter(|c| !node.cpuset.contains(*c)) {
            warn!(
                "instance {} pinned to cpu {} outside node {} cpuset",
                inst.name, cpu, node.id
            );
        }
        model.instances.insert(
            inst.name.clone(),
            Placement::Pinned(
                cpus.iter()
                    .map(|&cpu| (cpu, inst.hostname.clone()))
                    .collect(),
            ),
        );
    }

    model.memory_data.push([model.memory_free]);
    model.memory_name.push(FREE.to_string());
    model.memory_hostname.push(FREE.to_string());

    debug!(
        "node {}: {} allocations, {} MB free, {}x{} cpu grid",
        node.id,
        model.memory_name.len() - 1,
        model.memory_free,
        model.cpu_col_row.columns(),
        model.cpu_col_row.rows()
    );
    model
}

fn unplaced_allocations(node_ids: &[String], instances: &[InstanceRecord]) -> Vec<UnplacedAllocation> {
    let mut out = Vec::new();
    for inst in instances {
        let Some(pinning) = &inst.numa_topology else {
            continue;
        };
        for id in pinning.node_ids() {
            if node_ids.iter().any(|n| n == id) {
                continue;
            }
            out.push(UnplacedAllocation {
                instance: inst.name.clone(),
                node_id: id.to_string(),
                memory_mb: pinning.memory.get(id).copied().unwrap_or(0),
            });
        }
    }
    out
}

/// Numeric ids in numeric order, then any other ids lexicographically.
pub fn node_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn to_signed(mb: u64) -> i64 {
    i64::try_from(mb).unwrap_or(i64::MAX)
}
