use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths;

pub const DEFAULT_ROOT_PATH: &str = "/";
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8192;
pub const DEFAULT_SCAN_BATCH: usize = 256;
pub const DEFAULT_HTTP_PORT: u16 = 7880;

/// How renames guard namespace uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenameMode {
    /// Conditional write when the store enforces unique paths, otherwise detect-and-compensate.
    #[default]
    Auto,
    /// Always write, re-query, and roll back on collision.
    DetectAndCompensate,
    /// Rely on the store rejecting colliding writes.
    ConditionalWrite,
}

impl std::str::FromStr for RenameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "detect" | "detect_and_compensate" => Ok(Self::DetectAndCompensate),
            "conditional" | "conditional_write" => Ok(Self::ConditionalWrite),
            _ => Err(format!("unknown rename mode: {s}")),
        }
    }
}

/// Namespace settings fixed at deployment time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamespaceConfig {
    /// Path of the root folder; always normalized.
    pub root_path: String,
    /// Chunk size for content reads
    pub read_chunk_size: usize,
    pub rename_mode: RenameMode,
    /// Page size for range scans over folder paths and filenames
    pub scan_batch: usize,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            root_path: DEFAULT_ROOT_PATH.to_string(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            rename_mode: RenameMode::Auto,
            scan_batch: DEFAULT_SCAN_BATCH,
        }
    }
}

impl NamespaceConfig {
    pub fn with_root(root: &str) -> Self {
        Self { root_path: paths::normalize(root), ..Default::default() }
    }

    /// Normalize the root and clamp sizes to sane minimums.
    pub fn normalized(mut self) -> Self {
        self.root_path = paths::normalize(&self.root_path);
        if self.root_path.is_empty() { self.root_path = DEFAULT_ROOT_PATH.to_string(); }
        self.read_chunk_size = self.read_chunk_size.max(1);
        self.scan_batch = self.scan_batch.max(1);
        self
    }
}

/// Server process settings. Resolved as defaults, then environment, then flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub http_port: u16,
    /// Snapshot and payload directory; None keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub snapshot_interval_ms: u64,
    pub enforce_unique_paths: bool,
    pub namespace: NamespaceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            data_dir: None,
            snapshot_interval_ms: 5_000,
            enforce_unique_paths: false,
            namespace: NamespaceConfig::default(),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        if let Some(v) = args[i].strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            return Some(v);
        }
        i += 1;
    }
    None
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.bind_addr, self.http_port) }

    /// Overlay values from an environment lookup. Unparseable values are ignored.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(p) = get("DOCFS_HTTP_PORT").and_then(|v| v.parse::<u16>().ok()) { self.http_port = p; }
        if let Some(a) = get("DOCFS_BIND").and_then(|v| v.parse::<IpAddr>().ok()) { self.bind_addr = a; }
        if let Some(d) = get("DOCFS_DATA_DIR").filter(|v| !v.trim().is_empty()) { self.data_dir = Some(PathBuf::from(d)); }
        if let Some(r) = get("DOCFS_ROOT_PATH").filter(|v| !v.trim().is_empty()) { self.namespace.root_path = r; }
        if let Some(c) = get("DOCFS_CHUNK_SIZE").and_then(|v| v.parse::<usize>().ok()) { self.namespace.read_chunk_size = c; }
        if let Some(ms) = get("DOCFS_SNAPSHOT_MS").and_then(|v| v.parse::<u64>().ok()) { self.snapshot_interval_ms = ms; }
        if let Some(u) = get("DOCFS_UNIQUE_PATHS").and_then(|v| parse_bool(&v)) { self.enforce_unique_paths = u; }
        if let Some(m) = get("DOCFS_RENAME_MODE").and_then(|v| v.parse::<RenameMode>().ok()) { self.namespace.rename_mode = m; }
    }

    /// Overlay values from command-line flags (`--port 7880` or `--port=7880`).
    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(p) = arg_value(args, "--port").and_then(|v| v.parse::<u16>().ok()) { self.http_port = p; }
        if let Some(a) = arg_value(args, "--bind").and_then(|v| v.parse::<IpAddr>().ok()) { self.bind_addr = a; }
        if let Some(d) = arg_value(args, "--data-dir") { self.data_dir = Some(PathBuf::from(d)); }
        if let Some(r) = arg_value(args, "--root") { self.namespace.root_path = r.to_string(); }
        if let Some(c) = arg_value(args, "--chunk-size").and_then(|v| v.parse::<usize>().ok()) { self.namespace.read_chunk_size = c; }
        if let Some(m) = arg_value(args, "--rename-mode").and_then(|v| v.parse::<RenameMode>().ok()) { self.namespace.rename_mode = m; }
        if args.iter().any(|a| a == "--unique-paths") { self.enforce_unique_paths = true; }
        if args.iter().any(|a| a == "--no-unique-paths") { self.enforce_unique_paths = false; }
    }

    /// Defaults, then process environment, then `std::env::args`.
    pub fn from_env_and_args() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok());
        let args: Vec<String> = std::env::args().skip(1).collect();
        cfg.apply_args(&args);
        cfg.namespace = cfg.namespace.normalized();
        cfg
    }
}
