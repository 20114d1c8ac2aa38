use serde::Serialize;

use crate::backends::{ContainerHost, HypervisorStatistics};

/// Cluster-wide resource counters shown on the hypervisor index page.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct AggregateStats {
    pub hypervisors: u64,
    pub container_hosts: u64,
    pub vcpus: u64,
    /// Fractional because containers report CPU use as shares.
    pub vcpus_used: f64,
    pub memory_mb: u64,
    pub memory_mb_used: u64,
    pub local_gb: u64,
    pub local_gb_used: u64,
    pub running_vms: u64,
    pub running_containers: u64,
}

/// Merges compute statistics with container host usage.
///
/// Containers run on the compute hosts, so capacity comes from the compute
/// side and container usage is added on top. Without compute statistics the
/// container hosts' own capacity is used instead.
pub fn aggregate(compute: Option<&HypervisorStatistics>, hosts: &[ContainerHost]) -> AggregateStats {
    let mut out = AggregateStats {
        container_hosts: hosts.len() as u64,
        ..AggregateStats::default()
    };

    match compute {
        Some(c) => {
            out.hypervisors = c.count;
            out.vcpus = c.vcpus;
            out.vcpus_used = c.vcpus_used as f64;
            out.memory_mb = c.memory_mb;
            out.memory_mb_used = c.memory_mb_used;
            out.local_gb = c.local_gb;
            out.local_gb_used = c.local_gb_used;
            out.running_vms = c.running_vms;
        }
        None => {
            for h in hosts {
                out.vcpus += h.cpus;
                out.memory_mb += h.mem_total;
                out.local_gb += h.disk_total;
            }
        }
    }

    for h in hosts {
        out.vcpus_used += h.cpu_used;
        out.memory_mb_used += h.mem_used;
        out.local_gb_used += h.disk_used;
        out.running_containers += h.total_containers;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute() -> HypervisorStatistics {
        HypervisorStatistics {
            count: 1,
            vcpus: 32,
            vcpus_used: 16,
            memory_mb: 128651,
            memory_mb_used: 16896,
            local_gb: 442,
            local_gb_used: 40,
            running_vms: 4,
        }
    }

    fn host() -> ContainerHost {
        serde_json::from_str(include_str!("../fixtures/container_host.json")).unwrap()
    }

    #[test]
    fn container_usage_adds_to_compute_totals() {
        let s = aggregate(Some(&compute()), &[host()]);
        assert_eq!(s.hypervisors, 1);
        assert_eq!(s.container_hosts, 1);
        assert_eq!(s.vcpus, 32);
        assert_eq!(s.vcpus_used, 24.0);
        assert_eq!(s.memory_mb, 128651);
        assert_eq!(s.memory_mb_used, 16896 + 8192);
        assert_eq!(s.running_vms, 4);
        assert_eq!(s.running_containers, 2);
    }

    #[test]
    fn container_hosts_alone_supply_capacity() {
        let s = aggregate(None, &[host(), host()]);
        assert_eq!(s.hypervisors, 0);
        assert_eq!(s.vcpus, 64);
        assert_eq!(s.memory_mb, 2 * 128651);
        assert_eq!(s.local_gb, 884);
        assert_eq!(s.running_containers, 4);
    }

    #[test]
    fn nothing_reachable_is_all_zero() {
        assert_eq!(aggregate(None, &[]), AggregateStats::default());
    }
}
