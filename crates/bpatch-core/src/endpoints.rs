//! Remote patch server endpoints and URL construction.

use crate::config::PatchConfig;

/// Primary/fallback hosts plus the version-segment flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoints {
    primary_host: String,
    fallback_host: String,
    ignore_resource_version: bool,
}

impl RemoteEndpoints {
    pub fn new(
        primary_host: impl Into<String>,
        fallback_host: impl Into<String>,
        ignore_resource_version: bool,
    ) -> Self {
        Self {
            primary_host: trim_host(primary_host.into()),
            fallback_host: trim_host(fallback_host.into()),
            ignore_resource_version,
        }
    }

    pub fn from_config(cfg: &PatchConfig) -> Self {
        Self::new(
            cfg.primary_host.clone(),
            cfg.fallback_host.clone(),
            cfg.ignore_resource_version,
        )
    }

    /// `{primary}/{version}/{file}`, or `{primary}/{file}` when versions are ignored.
    pub fn primary_url(&self, resource_version: u32, file_name: &str) -> String {
        self.make_url(&self.primary_host, resource_version, file_name)
    }

    pub fn fallback_url(&self, resource_version: u32, file_name: &str) -> String {
        self.make_url(&self.fallback_host, resource_version, file_name)
    }

    fn make_url(&self, host: &str, resource_version: u32, file_name: &str) -> String {
        if self.ignore_resource_version {
            format!("{}/{}", host, file_name)
        } else {
            format!("{}/{}/{}", host, resource_version, file_name)
        }
    }
}

fn trim_host(mut host: String) -> String {
    while host.ends_with('/') {
        host.pop();
    }
    host
}
