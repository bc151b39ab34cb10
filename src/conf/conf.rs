use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use smr::{ReplicaId, Workload};

use super::errors::ConfError;

pub const DEFAULT_MAX_BATCH: usize = 5000;
pub const DEFAULT_EXEC_INTERVAL_MS: u64 = 1;

/// ReplicaConf is the configuration of one replica process.
///
/// Every field has a default: an empty yaml document is a single replica
/// serving the generic workload on 127.0.0.1:7070.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReplicaConf {
    #[serde(default)]
    pub replica_id: ReplicaId,

    #[serde(default = "default_n_replicas")]
    pub n_replicas: usize,

    /// client api address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default, deserialize_with = "deserialize_workload")]
    pub workload: Workload,

    /// max number of client commands in one instance.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// how long the exec loop sleeps when nothing can be executed.
    #[serde(default = "default_exec_interval_ms")]
    pub exec_interval_ms: u64,

    /// reply to a client after its command is executed, instead of once it
    /// is committed.
    #[serde(default = "default_dreply")]
    pub dreply: bool,

    /// log to this file instead of stderr.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

fn default_n_replicas() -> usize {
    1
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7070))
}

fn default_max_batch() -> usize {
    DEFAULT_MAX_BATCH
}

fn default_exec_interval_ms() -> u64 {
    DEFAULT_EXEC_INTERVAL_MS
}

fn default_dreply() -> bool {
    true
}

fn deserialize_workload<'de, D>(d: D) -> Result<Workload, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(d)?;
    ReplicaConf::parse_workload(&name).map_err(de::Error::custom)
}

impl Default for ReplicaConf {
    fn default() -> Self {
        ReplicaConf {
            replica_id: 0,
            n_replicas: default_n_replicas(),
            listen: default_listen(),
            workload: Workload::default(),
            max_batch: DEFAULT_MAX_BATCH,
            exec_interval_ms: DEFAULT_EXEC_INTERVAL_MS,
            dreply: default_dreply(),
            log_path: None,
        }
    }
}

impl ReplicaConf {
    /// from_file reads replica conf yaml from a local file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ReplicaConf, ConfError> {
        let content = fs::read_to_string(path)?;
        ReplicaConf::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<ReplicaConf, ConfError> {
        // an empty document is null, not an empty mapping
        let conf: ReplicaConf = if content.trim().is_empty() {
            ReplicaConf::default()
        } else {
            serde_yaml::from_str(content)?
        };

        conf.check()?;
        Ok(conf)
    }

    /// parse_workload parses a workload name case-insensitively.
    pub fn parse_workload(name: &str) -> Result<Workload, ConfError> {
        name.parse()
            .map_err(|_| ConfError::BadWorkload(name.to_string()))
    }

    /// check validates a conf after loading or after overriding fields.
    pub fn check(&self) -> Result<(), ConfError> {
        if self.n_replicas == 0 {
            return Err(ConfError::NoReplica);
        }
        if self.replica_id < 0 || self.replica_id as usize >= self.n_replicas {
            return Err(ConfError::BadReplicaId(self.replica_id, self.n_replicas));
        }
        if self.max_batch == 0 {
            return Err(ConfError::BadBatch);
        }
        Ok(())
    }

    pub fn exec_interval(&self) -> Duration {
        Duration::from_millis(self.exec_interval_ms)
    }
}
