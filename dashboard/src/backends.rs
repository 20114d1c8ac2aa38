use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::config::DashboardConfig;
use crate::topology::{stringified, InstanceRecord};

const CONTAINER_API_VERSION: &str = "container 1.23";

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

/// Cluster-wide counters from the compute service.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct HypervisorStatistics {
    pub count: u64,
    pub vcpus: u64,
    pub vcpus_used: u64,
    pub memory_mb: u64,
    pub memory_mb_used: u64,
    pub local_gb: u64,
    pub local_gb_used: u64,
    pub running_vms: u64,
}

#[derive(Debug, Deserialize)]
struct StatisticsEnvelope {
    hypervisor_statistics: HypervisorStatistics,
}

/// A NUMA cell as reported inside a hypervisor record.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NumaCell {
    #[serde(deserialize_with = "stringified")]
    pub id: String,
    #[serde(default)]
    pub cpuset: Vec<u32>,
    #[serde(default)]
    pub siblings: Vec<Vec<u32>>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub cpu_usage: Option<u64>,
}

/// A hypervisor together with the servers it runs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Hypervisor {
    #[serde(deserialize_with = "stringified")]
    pub id: String,
    pub hypervisor_hostname: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub numa_topology: Vec<NumaCell>,
    #[serde(default)]
    pub servers: Vec<InstanceRecord>,
}

#[derive(Debug, Deserialize)]
pub struct HypervisorList {
    #[serde(default)]
    pub hypervisors: Vec<Hypervisor>,
}

/// A container host with its usage counters and containers.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ContainerHost {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub cpus: u64,
    #[serde(default)]
    pub cpu_used: f64,
    #[serde(default)]
    pub mem_total: u64,
    #[serde(default)]
    pub mem_used: u64,
    #[serde(default)]
    pub disk_total: u64,
    #[serde(default)]
    pub disk_used: u64,
    #[serde(default)]
    pub total_containers: u64,
    #[serde(default)]
    pub containers: Vec<InstanceRecord>,
}

#[derive(Debug, Deserialize)]
struct ContainerHostList {
    #[serde(default)]
    hosts: Vec<ContainerHost>,
}

// -----------------------------------------------------------------------------
// Service seams
// -----------------------------------------------------------------------------

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn hypervisor_statistics(&self) -> Result<HypervisorStatistics>;

    /// Hypervisors matching `name`, each with its server list.
    async fn hypervisor_servers(&self, name: &str) -> Result<Vec<Hypervisor>>;
}

#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn list_hosts(&self) -> Result<Vec<ContainerHost>>;

    async fn host_show(&self, name: &str) -> Result<ContainerHost>;
}

// -----------------------------------------------------------------------------
// HTTP clients
// -----------------------------------------------------------------------------

/// Thin JSON GET client rooted at one service endpoint.
struct ServiceEndpoint {
    service: &'static str,
    client: Client,
    base_url: Option<Url>,
    token: Option<String>,
    extra_headers: Vec<(&'static str, &'static str)>,
}

impl ServiceEndpoint {
    fn new(
        service: &'static str,
        base_url: Option<&str>,
        cfg: &DashboardConfig,
        extra_headers: Vec<(&'static str, &'static str)>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .context("building HTTP client")?;
        let base_url = base_url
            .map(|u| Url::parse(u).with_context(|| format!("invalid {} url {}", service, u)))
            .transpose()?;

        Ok(Self {
            service,
            client,
            base_url,
            token: cfg.auth_token.clone(),
            extra_headers,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self
            .base_url
            .clone()
            .ok_or_else(|| anyhow!("{} endpoint not configured", self.service))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} url cannot carry a path", self.service))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments)?;
        debug!("GET {}", url);

        let mut req = self.client.get(url.clone()).header("Accept", "application/json");
        for (k, v) in &self.extra_headers {
            req = req.header(*k, *v);
        }
        if let Some(token) = &self.token {
            req = req.header("X-Auth-Token", token);
        }

        let body = req
            .send()
            .await
            .with_context(|| format!("{} unreachable", self.service))?
            .error_for_status()?
            .json::<T>()
            .await
            .with_context(|| format!("decoding {} response from {}", self.service, url))?;
        Ok(body)
    }
}

pub struct HttpCompute {
    endpoint: ServiceEndpoint,
}

impl HttpCompute {
    pub fn new(cfg: &DashboardConfig) -> Result<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new("compute", cfg.compute_url.as_deref(), cfg, Vec::new())?,
        })
    }
}

#[async_trait]
impl ComputeApi for HttpCompute {
    async fn hypervisor_statistics(&self) -> Result<HypervisorStatistics> {
        let env: StatisticsEnvelope = self
            .endpoint
            .get_json(&["os-hypervisors", "statistics"])
            .await?;
        Ok(env.hypervisor_statistics)
    }

    async fn hypervisor_servers(&self, name: &str) -> Result<Vec<Hypervisor>> {
        let list: HypervisorList = self
            .endpoint
            .get_json(&["os-hypervisors", name, "servers"])
            .await?;
        Ok(list.hypervisors)
    }
}

pub struct HttpContainer {
    endpoint: ServiceEndpoint,
}

impl HttpContainer {
    pub fn new(cfg: &DashboardConfig) -> Result<Self> {
        Ok(Self {
            endpoint: ServiceEndpoint::new(
                "container",
                cfg.container_url.as_deref(),
                cfg,
                vec![("OpenStack-API-Version", CONTAINER_API_VERSION)],
            )?,
        })
    }
}

#[async_trait]
impl ContainerApi for HttpContainer {
    async fn list_hosts(&self) -> Result<Vec<ContainerHost>> {
        let list: ContainerHostList = self.endpoint.get_json(&["v1", "hosts"]).await?;
        Ok(list.hosts)
    }

    async fn host_show(&self, name: &str) -> Result<ContainerHost> {
        self.endpoint.get_json(&["v1", "hosts", name]).await
    }
}
