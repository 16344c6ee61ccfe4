//! Cross-cluster pod log aggregation
//!
//! A bounded, terminating fan-out: for each selected cluster, concurrently
//! list matching pods, then concurrently fetch each pod's log tail.
//! Per-pod and per-cluster failures are isolated into error markers and
//! never cancel sibling fetches. Entries merge into one
//! timestamp-ordered sequence; the caller polls again to refresh -- this is
//! not a live stream.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams};
use serde::Serialize;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::registry::ClusterRegistry;

/// One log line, attributed to its cluster and pod
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Cluster the line came from
    pub cluster: String,
    /// Pod namespace
    pub namespace: String,
    /// Pod name
    pub pod: String,
    /// Kubelet timestamp, when the line carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// The line itself, timestamp stripped
    pub line: String,
}

/// A cluster (or pod) whose logs could not be fetched
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLogError {
    /// Cluster the failure belongs to
    pub cluster: String,
    /// What went wrong
    pub message: String,
}

/// Merged log fetch result: entries plus per-cluster error markers
#[derive(Clone, Debug, Default, Serialize)]
pub struct LogAggregate {
    /// All fetched lines, ordered by timestamp
    pub entries: Vec<LogEntry>,
    /// Clusters and pods that failed, without cancelling the rest
    pub errors: Vec<ClusterLogError>,
}

/// Fetch and merge pod logs across clusters
///
/// The whole fan-out shares one deadline: a single unreachable cluster
/// costs at most `overall_timeout`, never a hang, and contributes an error
/// marker instead of sinking the result.
pub async fn aggregate(
    registry: &ClusterRegistry,
    cluster_ids: &[String],
    namespace: &str,
    label_selector: Option<&str>,
    tail_lines: i64,
    overall_timeout: Duration,
) -> LogAggregate {
    let deadline = Instant::now() + overall_timeout;

    let per_cluster = join_all(cluster_ids.iter().map(|cluster_id| async move {
        match timeout_at(
            deadline,
            cluster_logs(registry, cluster_id, namespace, label_selector, tail_lines),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => (
                Vec::new(),
                vec![ClusterLogError {
                    cluster: cluster_id.clone(),
                    message: "log fetch timed out".to_string(),
                }],
            ),
        }
    }))
    .await;

    let mut aggregate = LogAggregate::default();
    for (entries, errors) in per_cluster {
        aggregate.entries.extend(entries);
        aggregate.errors.extend(errors);
    }
    sort_entries(&mut aggregate.entries);

    debug!(
        entries = aggregate.entries.len(),
        errors = aggregate.errors.len(),
        "Aggregated logs"
    );
    aggregate
}

async fn cluster_logs(
    registry: &ClusterRegistry,
    cluster_id: &str,
    namespace: &str,
    label_selector: Option<&str>,
    tail_lines: i64,
) -> (Vec<LogEntry>, Vec<ClusterLogError>) {
    let handle = match registry.get_required(cluster_id) {
        Ok(h) => h,
        Err(e) => {
            return (
                Vec::new(),
                vec![ClusterLogError {
                    cluster: cluster_id.to_string(),
                    message: e.to_string(),
                }],
            )
        }
    };

    let pods: Api<Pod> = Api::namespaced(handle.client(), namespace);
    let mut params = ListParams::default();
    if let Some(selector) = label_selector {
        params = params.labels(selector);
    }

    let pod_list = match pods.list(&params).await {
        Ok(list) => list,
        Err(e) => {
            return (
                Vec::new(),
                vec![ClusterLogError {
                    cluster: cluster_id.to_string(),
                    message: e.to_string(),
                }],
            )
        }
    };

    let pod_names: Vec<String> = pod_list
        .items
        .into_iter()
        .filter_map(|p| p.metadata.name)
        .collect();

    let fetches = join_all(pod_names.into_iter().map(|pod_name| {
        let pods = pods.clone();
        async move {
            let log_params = LogParams {
                tail_lines: Some(tail_lines),
                timestamps: true,
                ..LogParams::default()
            };
            match pods.logs(&pod_name, &log_params).await {
                Ok(raw) => Ok((pod_name, raw)),
                Err(e) => Err(ClusterLogError {
                    cluster: cluster_id.to_string(),
                    message: format!("pod {}: {}", pod_name, e),
                }),
            }
        }
    }))
    .await;

    let mut entries = Vec::new();
    let mut errors = Vec::new();
    for fetch in fetches {
        match fetch {
            Ok((pod_name, raw)) => {
                entries.extend(
                    raw.lines()
                        .filter(|l| !l.is_empty())
                        .map(|line| parse_log_line(cluster_id, namespace, &pod_name, line)),
                );
            }
            Err(marker) => errors.push(marker),
        }
    }

    (entries, errors)
}

/// Split the kubelet's leading RFC3339 timestamp off a log line
///
/// Lines without a parseable timestamp are kept whole with no timestamp.
fn parse_log_line(cluster: &str, namespace: &str, pod: &str, raw: &str) -> LogEntry {
    let (timestamp, line) = match raw.split_once(' ') {
        Some((stamp, rest)) => match DateTime::parse_from_rfc3339(stamp) {
            Ok(ts) => (Some(ts.with_timezone(&Utc)), rest.to_string()),
            Err(_) => (None, raw.to_string()),
        },
        None => (None, raw.to_string()),
    };
    LogEntry {
        cluster: cluster.to_string(),
        namespace: namespace.to_string(),
        pod: pod.to_string(),
        timestamp,
        line,
    }
}

/// Order entries by timestamp, untimestamped lines last, ties by origin
fn sort_entries(entries: &mut [LogEntry]) {
    entries.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x
            .cmp(&y)
            .then_with(|| (&a.cluster, &a.pod).cmp(&(&b.cluster, &b.pod))),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => (&a.cluster, &a.pod).cmp(&(&b.cluster, &b.pod)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamped_line() {
        let entry = parse_log_line(
            "c1",
            "default",
            "web-0",
            "2025-04-02T10:30:00.123456789Z starting server on :8080",
        );
        assert!(entry.timestamp.is_some());
        assert_eq!(entry.line, "starting server on :8080");
        assert_eq!(entry.pod, "web-0");
    }

    #[test]
    fn test_parse_line_without_timestamp() {
        let entry = parse_log_line("c1", "default", "web-0", "plain text line");
        assert!(entry.timestamp.is_none());
        assert_eq!(entry.line, "plain text line");
    }

    #[test]
    fn test_merge_orders_across_clusters() {
        let mut entries = vec![
            parse_log_line("c2", "default", "b", "2025-04-02T10:30:02Z second"),
            parse_log_line("c1", "default", "a", "no timestamp"),
            parse_log_line("c1", "default", "a", "2025-04-02T10:30:01Z first"),
            parse_log_line("c2", "default", "b", "2025-04-02T10:30:03Z third"),
        ];
        sort_entries(&mut entries);

        let lines: Vec<&str> = entries.iter().map(|e| e.line.as_str()).collect();
        // Interleaved by time regardless of source cluster; untimestamped last
        assert_eq!(lines, vec!["first", "second", "third", "no timestamp"]);
    }

    #[tokio::test]
    async fn test_unregistered_cluster_becomes_error_marker() {
        let registry = ClusterRegistry::new();
        let result = aggregate(
            &registry,
            &["ghost".to_string()],
            "default",
            None,
            100,
            Duration::from_secs(1),
        )
        .await;

        assert!(result.entries.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].cluster, "ghost");
        assert!(result.errors[0].message.contains("not registered"));
    }

    #[tokio::test]
    async fn test_unreachable_cluster_does_not_sink_the_reachable_one() {
        // One dead cluster, one missing cluster: both become markers, and
        // the fan-out still terminates within the deadline.
        let registry = ClusterRegistry::with_timeouts(
            Duration::from_millis(200),
            Duration::from_millis(200),
        );
        let config = kube::Config::new("https://127.0.0.1:1".parse().unwrap());
        registry.install_for_test("dead", kube::Client::try_from(config).unwrap());

        let result = aggregate(
            &registry,
            &["dead".to_string(), "ghost".to_string()],
            "default",
            Some("app=web"),
            50,
            Duration::from_secs(5),
        )
        .await;

        assert!(result.entries.is_empty());
        assert_eq!(result.errors.len(), 2);
        let clusters: Vec<&str> = result.errors.iter().map(|e| e.cluster.as_str()).collect();
        assert!(clusters.contains(&"dead"));
        assert!(clusters.contains(&"ghost"));
    }
}
