//! Graceful MCP-style tool-server degradation.
//!
//! At startup the orchestrator loads a set of tool-server descriptors and
//! attempts a combined initialization; on failure it probes each server
//! individually and drops the ones that fail, keeping the rest active.

use std::time::Duration;

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum McpStatus {
    Healthy,
    Failed,
}

/// A configured external tool server — the thing behind a classifier
/// tool-set name (`task`, `web`, `calendar`, ...).
#[derive(Debug, Clone)]
pub struct McpServerDescriptor {
    pub name: String,
    /// Health-check URL; probing is a plain HTTP GET with a short timeout.
    pub health_url: String,
}

/// Probe every descriptor at once. `Ok` means every server answered; `Err`
/// means at least one didn't, and the caller should fall back to
/// [`probe_individually`].
pub async fn probe_combined(client: &reqwest::Client, descriptors: &[McpServerDescriptor]) -> bool {
    for d in descriptors {
        if !probe_one(client, d).await {
            return false;
        }
    }
    true
}

/// Probe each descriptor independently, returning `(name, status)` pairs.
/// Used after a failed combined probe so healthy servers aren't punished for
/// a sibling's outage.
pub async fn probe_individually(
    client: &reqwest::Client,
    descriptors: &[McpServerDescriptor],
) -> Vec<(String, McpStatus)> {
    let mut results = Vec::with_capacity(descriptors.len());
    for d in descriptors {
        let status = if probe_one(client, d).await {
            McpStatus::Healthy
        } else {
            McpStatus::Failed
        };
        if status == McpStatus::Failed {
            warn!(server = %d.name, "MCP server init failed, dropping from active set");
        }
        results.push((d.name.clone(), status));
    }
    results
}

async fn probe_one(client: &reqwest::Client, descriptor: &McpServerDescriptor) -> bool {
    match tokio::time::timeout(
        Duration::from_secs(5),
        client.get(&descriptor.health_url).send(),
    )
    .await
    {
        Ok(Ok(resp)) => resp.status().is_success(),
        Ok(Err(e)) => {
            warn!(server = %descriptor.name, error = %e, "MCP server probe failed");
            false
        }
        Err(_) => {
            warn!(server = %descriptor.name, "MCP server probe timed out");
            false
        }
    }
}

/// Run the full combined-then-individual degradation sequence, returning
/// per-server statuses.
pub async fn init_servers(
    client: &reqwest::Client,
    descriptors: &[McpServerDescriptor],
) -> Vec<(String, McpStatus)> {
    if descriptors.is_empty() {
        return Vec::new();
    }

    if probe_combined(client, descriptors).await {
        info!(count = descriptors.len(), "all MCP servers healthy on combined init");
        return descriptors
            .iter()
            .map(|d| (d.name.clone(), McpStatus::Healthy))
            .collect();
    }

    info!("combined MCP init failed, probing servers individually");
    probe_individually(client, descriptors).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_descriptor_list_is_trivially_healthy() {
        let client = reqwest::Client::new();
        assert!(init_servers(&client, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_failed_not_panicking() {
        let client = reqwest::Client::new();
        let descriptors = vec![McpServerDescriptor {
            name: "ghost".to_string(),
            health_url: "http://127.0.0.1:1/health".to_string(),
        }];
        let results = init_servers(&client, &descriptors).await;
        assert_eq!(results, vec![("ghost".to_string(), McpStatus::Failed)]);
    }
}
