// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// How long a stream accepts appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionPolicy {
    /// Streams accept appends until explicitly archived.
    Indefinite,
    /// A stream is sealed once it holds this many envelopes.
    SealAfter(u64),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::Indefinite
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one log file per stream. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// fsync every append batch before it becomes visible.
    pub fsync: bool,
    /// Verify every recovered chain on open and refuse to start on a break.
    pub verify_on_open: bool,
    pub retention: RetentionPolicy,
    /// How many times `append` re-reads the head after losing a race.
    pub max_append_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            fsync: true,
            verify_on_open: true,
            retention: RetentionPolicy::Indefinite,
            max_append_retries: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotPolicy {
    /// Publish a snapshot after folding at least this many envelopes. 0 disables caching.
    pub cadence: u64,
    /// Store the post-commit state as the fresh snapshot after every accepted command.
    pub refresh_on_commit: bool,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            cadence: 1,
            refresh_on_commit: true,
        }
    }
}

impl SnapshotPolicy {
    pub fn enabled(&self) -> bool {
        self.cadence > 0
    }

    pub fn should_publish(&self, folded: u64) -> bool {
        self.enabled() && folded >= self.cadence
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub store: StoreConfig,
    pub snapshot: SnapshotPolicy,
    pub bind_addr: SocketAddr,
    pub auth_token: Option<String>,
    /// Capacity of the state-change broadcast channel.
    pub notify_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            snapshot: SnapshotPolicy::default(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            auth_token: None,
            notify_capacity: 256,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `CIM_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(dir) = std::env::var("CIM_DATA_DIR") {
            if !dir.is_empty() {
                cfg.store.data_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(addr) = std::env::var("CIM_BIND_ADDR") {
            match addr.parse() {
                Ok(a) => cfg.bind_addr = a,
                Err(_) => tracing::warn!("Ignoring invalid CIM_BIND_ADDR {:?}", addr),
            }
        }
        if let Ok(token) = std::env::var("CIM_AUTH_TOKEN") {
            if !token.is_empty() {
                cfg.auth_token = Some(token);
            }
        }
        if let Ok(cadence) = std::env::var("CIM_SNAPSHOT_CADENCE") {
            match cadence.parse() {
                Ok(c) => cfg.snapshot.cadence = c,
                Err(_) => tracing::warn!("Ignoring invalid CIM_SNAPSHOT_CADENCE {:?}", cadence),
            }
        }
        if let Ok(fsync) = std::env::var("CIM_FSYNC") {
            cfg.store.fsync = !matches!(fsync.as_str(), "0" | "false" | "off");
        }
        if let Ok(seal) = std::env::var("CIM_SEAL_AFTER") {
            if let Ok(n) = seal.parse() {
                cfg.store.retention = RetentionPolicy::SealAfter(n);
            }
        }

        cfg
    }
}
