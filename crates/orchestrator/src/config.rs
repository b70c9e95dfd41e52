use std::collections::HashSet;
use std::time::Duration;

use storage::RoleCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum TargetCloud {
    Aws,
    Azure,
}

/// Everything a run needs, gathered once at the CLI boundary and
/// passed by reference into every component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub manifest_uri: String,
    pub table_names: Option<HashSet<String>>,
    pub target_cloud: TargetCloud,
    pub target_table_root: String,
    pub checkpoint_interval: u32,
    pub parallel: bool,
    pub max_workers: usize,
    pub request_timeout: Duration,
    pub retry_cap: u32,
    pub commit_retry_cap: u32,
    pub progress_enabled: bool,
    pub source_credentials: RoleCredentials,
    pub target_credentials: RoleCredentials,
}

impl RunConfig {
    pub fn default_max_workers() -> usize {
        num_cpus::get()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            manifest_uri: String::new(),
            table_names: None,
            target_cloud: TargetCloud::Aws,
            target_table_root: String::new(),
            checkpoint_interval: 100,
            parallel: true,
            max_workers: Self::default_max_workers(),
            request_timeout: Duration::from_secs(30),
            retry_cap: 5,
            commit_retry_cap: 5,
            progress_enabled: true,
            source_credentials: RoleCredentials::default(),
            target_credentials: RoleCredentials::default(),
        }
    }
}
