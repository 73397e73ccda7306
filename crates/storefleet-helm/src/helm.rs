//! helm CLI wrapper
//!
//! Invokes the helm binary as a subprocess with a bounded deadline and
//! translates its `--output json` payloads into typed results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{HelmError, Result};

/// Default deadline for commands that take no `--timeout` of their own
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Flat fallback deadline for unrecognized timeout strings
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(600);

/// helm CLI wrapper
#[derive(Debug, Clone)]
pub struct Helm {
    kubeconfig: Option<PathBuf>,
    charts_dir: PathBuf,
}

/// Captured subprocess output from a successful command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Outcome of an uninstall; "release not found" counts as success
#[derive(Debug, Clone)]
pub struct UninstallOutcome {
    pub release: String,
    pub already_deleted: bool,
}

/// Parsed `helm status` result
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseStatus {
    pub name: String,
    pub namespace: String,
    pub phase: Option<String>,
    pub version: Option<i64>,
    pub app_version: Option<String>,
    pub last_deployed: Option<String>,
    /// Raw stdout when the JSON payload could not be parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

/// One row of `helm list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub chart: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Scope for `helm list`
#[derive(Debug, Clone)]
pub enum ReleaseScope {
    Namespace(String),
    AllNamespaces,
}

/// Install parameters for `helm install`
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub release: String,
    pub chart: String,
    pub namespace: String,
    pub values: BTreeMap<String, String>,
    pub values_file: Option<PathBuf>,
    /// helm-style duration string, e.g. "10m"
    pub timeout: String,
    pub create_namespace: bool,
    pub wait: bool,
}

impl InstallRequest {
    pub fn new(
        release: impl Into<String>,
        chart: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            release: release.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            values: BTreeMap::new(),
            values_file: None,
            timeout: "10m".to_string(),
            create_namespace: true,
            wait: true,
        }
    }
}

/// Convert a helm-style timeout string into a subprocess deadline.
///
/// A safety margin is added on top of helm's own timeout so the tool gets
/// a chance to report before the subprocess is killed: 60s for minutes and
/// hours, 30s for seconds. Unrecognized suffixes fall back to a flat 600s.
pub fn parse_timeout(timeout: &str) -> Duration {
    let timeout = timeout.trim();

    if let Some(minutes) = timeout
        .strip_suffix('m')
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_secs(minutes * 60 + 60);
    }
    if let Some(seconds) = timeout
        .strip_suffix('s')
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_secs(seconds + 30);
    }
    if let Some(hours) = timeout
        .strip_suffix('h')
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_secs(hours * 3600 + 60);
    }

    FALLBACK_TIMEOUT
}

impl Helm {
    pub fn new() -> Self {
        Self {
            kubeconfig: None,
            charts_dir: PathBuf::from("charts"),
        }
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    pub fn with_charts_dir(mut self, charts_dir: impl Into<PathBuf>) -> Self {
        self.charts_dir = charts_dir.into();
        self
    }

    /// Directory holding the platform's chart templates
    pub fn charts_dir(&self) -> &Path {
        &self.charts_dir
    }

    /// Check that the helm binary is present, returning its version string
    pub async fn verify_installed(&self) -> Result<String> {
        let which = Command::new("which").arg("helm").output().await?;
        if !which.status.success() {
            return Err(HelmError::HelmNotFound);
        }

        let output = self
            .run(&["version", "--short"], DEFAULT_COMMAND_TIMEOUT)
            .await?;
        let version = output.stdout.trim().to_string();
        tracing::info!(version = %version, "helm available");
        Ok(version)
    }

    /// Run a helm command with a deadline and capture its output
    async fn run(&self, args: &[&str], deadline: Duration) -> Result<CommandOutput> {
        let mut cmd = Command::new("helm");
        cmd.args(args);
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: helm {}", args.join(" "));

        let output = match tokio::time::timeout(deadline, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(seconds = deadline.as_secs(), "helm command timed out");
                return Err(HelmError::Timeout {
                    seconds: deadline.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::error!(stderr = %stderr, "helm command failed");
            return Err(HelmError::CommandFailed { stderr, stdout });
        }

        Ok(CommandOutput { stdout, stderr })
    }

    /// Install a release from a chart
    pub async fn install_release(&self, request: &InstallRequest) -> Result<CommandOutput> {
        let mut args = vec![
            "install".to_string(),
            request.release.clone(),
            request.chart.clone(),
            "--namespace".to_string(),
            request.namespace.clone(),
            "--timeout".to_string(),
            request.timeout.clone(),
        ];
        if request.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if request.wait {
            args.push("--wait".to_string());
        }
        if let Some(values_file) = &request.values_file {
            args.push("-f".to_string());
            args.push(values_file.display().to_string());
        }
        for (key, value) in &request.values {
            args.push("--set".to_string());
            args.push(format!("{key}={value}"));
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs, parse_timeout(&request.timeout)).await?;
        tracing::info!(release = %request.release, "Installed release");
        Ok(output)
    }

    /// Upgrade a release, installing it when absent
    pub async fn upgrade_release(&self, request: &InstallRequest) -> Result<CommandOutput> {
        let mut args = vec![
            "upgrade".to_string(),
            request.release.clone(),
            request.chart.clone(),
            "--namespace".to_string(),
            request.namespace.clone(),
            "--timeout".to_string(),
            request.timeout.clone(),
            "--install".to_string(),
        ];
        if request.wait {
            args.push("--wait".to_string());
        }
        if let Some(values_file) = &request.values_file {
            args.push("-f".to_string());
            args.push(values_file.display().to_string());
        }
        for (key, value) in &request.values {
            args.push("--set".to_string());
            args.push(format!("{key}={value}"));
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs, parse_timeout(&request.timeout)).await?;
        tracing::info!(release = %request.release, "Upgraded release");
        Ok(output)
    }

    /// Uninstall a release; "not found" is reported as already deleted
    pub async fn uninstall_release(
        &self,
        release: &str,
        namespace: &str,
        wait: bool,
    ) -> Result<UninstallOutcome> {
        let mut args = vec!["uninstall", release, "--namespace", namespace];
        if wait {
            args.push("--wait");
        }

        match self.run(&args, DEFAULT_COMMAND_TIMEOUT).await {
            Ok(_) => {
                tracing::info!(release = %release, "Uninstalled release");
                Ok(UninstallOutcome {
                    release: release.to_string(),
                    already_deleted: false,
                })
            }
            Err(HelmError::CommandFailed { stderr, .. })
                if stderr.to_lowercase().contains("not found") =>
            {
                tracing::info!(release = %release, "Release not found (already deleted)");
                Ok(UninstallOutcome {
                    release: release.to_string(),
                    already_deleted: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Fetch the status of a release
    pub async fn release_status(&self, release: &str, namespace: &str) -> Result<ReleaseStatus> {
        let args = [
            "status",
            release,
            "--namespace",
            namespace,
            "--output",
            "json",
        ];

        match self.run(&args, DEFAULT_COMMAND_TIMEOUT).await {
            Ok(output) => Ok(parse_status(&output.stdout, release, namespace)),
            Err(HelmError::CommandFailed { stderr, .. })
                if stderr.to_lowercase().contains("not found") =>
            {
                Err(HelmError::ReleaseNotFound(release.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// List releases in a namespace or across the whole cluster
    pub async fn list_releases(&self, scope: &ReleaseScope) -> Result<Vec<ReleaseSummary>> {
        let mut args = vec!["list", "--output", "json"];
        match scope {
            ReleaseScope::AllNamespaces => args.push("--all-namespaces"),
            ReleaseScope::Namespace(namespace) => {
                args.push("--namespace");
                args.push(namespace);
            }
        }

        let output = self.run(&args, DEFAULT_COMMAND_TIMEOUT).await?;
        Ok(parse_releases(&output.stdout))
    }

    /// Register a chart repository; an existing repo falls through to an update
    pub async fn add_repo(&self, name: &str, url: &str) -> Result<()> {
        match self
            .run(&["repo", "add", name, url], DEFAULT_COMMAND_TIMEOUT)
            .await
        {
            Ok(_) => Ok(()),
            Err(HelmError::CommandFailed { stderr, .. }) if stderr.contains("already exists") => {
                tracing::info!(repo = %name, "Repository already exists, updating");
                self.update_repos().await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn update_repos(&self) -> Result<()> {
        self.run(&["repo", "update"], DEFAULT_COMMAND_TIMEOUT)
            .await?;
        Ok(())
    }
}

fn parse_status(stdout: &str, release: &str, namespace: &str) -> ReleaseStatus {
    #[derive(Deserialize)]
    struct StatusJson {
        name: Option<String>,
        namespace: Option<String>,
        version: Option<i64>,
        info: Option<StatusInfo>,
        chart: Option<ChartJson>,
    }
    #[derive(Deserialize)]
    struct StatusInfo {
        status: Option<String>,
        last_deployed: Option<String>,
    }
    #[derive(Deserialize)]
    struct ChartJson {
        metadata: Option<ChartMetadata>,
    }
    #[derive(Deserialize)]
    struct ChartMetadata {
        #[serde(rename = "appVersion")]
        app_version: Option<String>,
    }

    match serde_json::from_str::<StatusJson>(stdout) {
        Ok(status) => ReleaseStatus {
            name: status.name.unwrap_or_else(|| release.to_string()),
            namespace: status.namespace.unwrap_or_else(|| namespace.to_string()),
            phase: status.info.as_ref().and_then(|i| i.status.clone()),
            version: status.version,
            app_version: status
                .chart
                .and_then(|c| c.metadata)
                .and_then(|m| m.app_version),
            last_deployed: status.info.and_then(|i| i.last_deployed),
            raw_output: None,
        },
        Err(err) => {
            tracing::warn!(release = %release, error = %err, "Unparseable helm status output");
            ReleaseStatus {
                name: release.to_string(),
                namespace: namespace.to_string(),
                phase: None,
                version: None,
                app_version: None,
                last_deployed: None,
                raw_output: Some(stdout.to_string()),
            }
        }
    }
}

fn parse_releases(stdout: &str) -> Vec<ReleaseSummary> {
    if stdout.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(stdout).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Unparseable helm list output");
        Vec::new()
    })
}
