// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Resolve API server endpoint and credentials from flags, kubeconfig or the pod environment.
// Author: Lukas Bower

//! Cluster connection settings.
//!
//! Resolution follows the usual client precedence: an explicit master URL
//! overrides the kubeconfig server, a kubeconfig supplies the current
//! context's server and credentials, and with neither the in-cluster
//! service account is used.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use log::{info, warn};
use serde::Deserialize;

use super::ClusterError;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Endpoint and credentials for the API server.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Base URL, e.g. `https://10.0.0.1:443` or `http://127.0.0.1:8001`.
    pub server: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// PEM bundle trusted for the server certificate.
    pub ca_pem: Option<Vec<u8>>,
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("server", &self.server)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("ca_pem", &self.ca_pem.as_ref().map(Vec::len))
            .finish()
    }
}

impl ClusterConfig {
    /// Build a configuration from the `--master` and `--kubeconfig` flags.
    pub fn from_flags(
        master: Option<&str>,
        kubeconfig: Option<&Path>,
    ) -> Result<Self, ClusterError> {
        let master = master.filter(|value| !value.is_empty());
        let mut config = match (master, kubeconfig) {
            (None, None) => {
                info!("[k9p][cluster] no --master or --kubeconfig, using in-cluster config");
                return Self::in_cluster(
                    |key| env::var(key).ok(),
                    Path::new(SERVICE_ACCOUNT_DIR),
                );
            }
            (Some(master), None) => Self {
                server: master.to_owned(),
                ..Self::default()
            },
            (_, Some(path)) => Self::from_kubeconfig(path)?,
        };
        if let Some(master) = master {
            config.server = master.to_owned();
        }
        config.server = config.server.trim_end_matches('/').to_owned();
        if config.server.is_empty() {
            return Err(ClusterError::Config("API server URL is empty".to_owned()));
        }
        Ok(config)
    }

    /// Build the configuration a pod receives from its service account.
    /// `lookup` reads environment variables; `dir` holds `token` and `ca.crt`.
    pub fn in_cluster(
        lookup: impl Fn(&str) -> Option<String>,
        dir: &Path,
    ) -> Result<Self, ClusterError> {
        let (Some(host), Some(port)) = (
            lookup("KUBERNETES_SERVICE_HOST"),
            lookup("KUBERNETES_SERVICE_PORT"),
        ) else {
            return Err(ClusterError::Config(
                "not running in a cluster: KUBERNETES_SERVICE_HOST/PORT unset".to_owned(),
            ));
        };
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };
        let token = fs::read_to_string(dir.join("token"))?.trim().to_owned();
        let ca_pem = match fs::read(dir.join("ca.crt")) {
            Ok(pem) => Some(pem),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            server: format!("https://{host}:{port}"),
            token: Some(token),
            ca_pem,
        })
    }

    /// Read the current context of a kubeconfig file.
    pub fn from_kubeconfig(path: &Path) -> Result<Self, ClusterError> {
        let text = fs::read_to_string(path)?;
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        kubeconfig.resolve(base)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Kubeconfig {
    #[serde(default)]
    current_context: Option<String>,
    #[serde(default)]
    clusters: Vec<Named<ClusterEntry>>,
    #[serde(default)]
    contexts: Vec<Named<ContextEntry>>,
    #[serde(default)]
    users: Vec<Named<UserEntry>>,
}

#[derive(Debug, Deserialize)]
struct Named<T> {
    name: String,
    #[serde(alias = "cluster", alias = "context", alias = "user")]
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    #[serde(default)]
    certificate_authority: Option<PathBuf>,
    #[serde(default)]
    certificate_authority_data: Option<String>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UserEntry {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "tokenFile")]
    token_file: Option<PathBuf>,
}

fn find<'a, T>(entries: &'a [Named<T>], name: &str, what: &str) -> Result<&'a T, ClusterError> {
    entries
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| &entry.value)
        .ok_or_else(|| ClusterError::Config(format!("kubeconfig has no {what} named {name:?}")))
}

impl Kubeconfig {
    fn resolve(&self, base: &Path) -> Result<ClusterConfig, ClusterError> {
        let context_name = self
            .current_context
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ClusterError::Config("kubeconfig has no current-context".to_owned()))?;
        let context = find(&self.contexts, context_name, "context")?;
        let cluster = find(&self.clusters, &context.cluster, "cluster")?;
        let anonymous = UserEntry::default();
        let user = match context.user.as_deref() {
            Some(name) => find(&self.users, name, "user")?,
            None => &anonymous,
        };
        if cluster.insecure_skip_tls_verify {
            warn!(
                "[k9p][cluster] insecure-skip-tls-verify is ignored; server certificates are verified"
            );
        }
        let ca_pem = match (&cluster.certificate_authority_data, &cluster.certificate_authority) {
            (Some(data), _) => Some(base64::engine::general_purpose::STANDARD.decode(data.trim())?),
            (None, Some(file)) => Some(fs::read(base.join(file))?),
            (None, None) => None,
        };
        let token = match (&user.token, &user.token_file) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(file)) => Some(fs::read_to_string(base.join(file))?.trim().to_owned()),
            (None, None) => None,
        };
        Ok(ClusterConfig {
            server: cluster.server.clone(),
            token,
            ca_pem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: dev-cluster
  cluster:
    server: https://dev.example:6443/
    certificate-authority-data: LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0tCg==
- name: other
  cluster:
    server: https://other.example:6443
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: alice
users:
- name: alice
  user:
    token: s3cret
"#;

    fn write_kubeconfig(dir: &tempfile::TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("config");
        fs::write(&path, text).expect("write kubeconfig");
        path
    }

    #[test]
    fn kubeconfig_current_context_supplies_server_and_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_kubeconfig(&dir, KUBECONFIG);
        let config = ClusterConfig::from_flags(None, Some(&path)).expect("resolve kubeconfig");
        assert_eq!(config.server, "https://dev.example:6443");
        assert_eq!(config.token.as_deref(), Some("s3cret"));
        assert_eq!(
            config.ca_pem.as_deref(),
            Some(&b"-----BEGIN CERTIFICATE-----\n"[..])
        );
    }

    #[test]
    fn master_overrides_kubeconfig_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_kubeconfig(&dir, KUBECONFIG);
        let config = ClusterConfig::from_flags(Some("http://127.0.0.1:8001"), Some(&path))
            .expect("resolve with master");
        assert_eq!(config.server, "http://127.0.0.1:8001");
        assert_eq!(config.token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn master_alone_needs_no_kubeconfig() {
        let config =
            ClusterConfig::from_flags(Some("http://127.0.0.1:8001/"), None).expect("master only");
        assert_eq!(config.server, "http://127.0.0.1:8001");
        assert_eq!(config.token, None);
    }

    #[test]
    fn missing_context_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = KUBECONFIG.replace("current-context: dev", "current-context: prod");
        let path = write_kubeconfig(&dir, &text);
        let err = ClusterConfig::from_flags(None, Some(&path)).expect_err("unknown context");
        assert!(matches!(err, ClusterError::Config(_)), "got {err:?}");
    }

    #[test]
    fn in_cluster_reads_service_account() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("token"), "pod-token\n").expect("write token");
        let env: HashMap<&str, &str> = [
            ("KUBERNETES_SERVICE_HOST", "fd00::1"),
            ("KUBERNETES_SERVICE_PORT", "443"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).map(|value| value.to_string());
        let config = ClusterConfig::in_cluster(lookup, dir.path()).expect("in-cluster config");
        assert_eq!(config.server, "https://[fd00::1]:443");
        assert_eq!(config.token.as_deref(), Some("pod-token"));
        assert_eq!(config.ca_pem, None);
    }

    #[test]
    #[serial]
    fn no_flags_outside_a_cluster_is_an_error() {
        let saved = env::var("KUBERNETES_SERVICE_HOST").ok();
        env::remove_var("KUBERNETES_SERVICE_HOST");
        let result = ClusterConfig::from_flags(None, None);
        if let Some(value) = saved {
            env::set_var("KUBERNETES_SERVICE_HOST", value);
        }
        assert!(matches!(result, Err(ClusterError::Config(_))));
    }
}
