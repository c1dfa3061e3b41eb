use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::InquisitorConfig;
use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::notify::LogNotifier;
use crate::observe::{MemoryChangeTracker, Observation};
use crate::pipeline::{HijackOutcome, HijackPipeline};
use crate::store::FileRelationshipStore;

#[derive(Deserialize)]
#[serde(untagged)]
enum Batch {
    Many(Vec<Observation>),
    One(Box<Observation>),
}

/// Parse one observation or an array of them
pub fn parse_observations(json: &str) -> Result<Vec<Observation>> {
    let batch: Batch = serde_json::from_str(json)?;
    Ok(match batch {
        Batch::Many(list) => list,
        Batch::One(obs) => vec![*obs],
    })
}

/// Execute the `ingest` command: apply observations in order, printing each outcome.
///
/// Changes carrying a change id are treated as already propagated.
pub async fn execute(
    ctx: &Invocation,
    config: &InquisitorConfig,
    store_path: &Path,
    input: &Path,
) -> Result<Vec<HijackOutcome>> {
    let json = std::fs::read_to_string(input).map_err(|e| {
        InquisitorError::Config(format!(
            "Failed to read observations {}: {}",
            input.display(),
            e
        ))
    })?;
    let observations = parse_observations(&json)?;

    let store = Arc::new(FileRelationshipStore::open(store_path)?);
    let pipeline = HijackPipeline::from_config(
        config,
        store,
        Arc::new(MemoryChangeTracker::new()),
        Arc::new(LogNotifier),
    );

    let mut outcomes = Vec::with_capacity(observations.len());
    for observation in observations {
        let label = observation.label();
        let outcome = pipeline.run(ctx, observation).await?;
        tracing::debug!(event = label, notified = outcome.message_id.is_some(), "Ingested");
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELETE_DISTRIBUTION: &str = r#"{
        "event": "distributionDeleted",
        "distribution": {
            "distributionId": "E1",
            "accountId": "111",
            "domain": "d1.cloudfront.net"
        }
    }"#;

    #[test]
    fn test_parse_single_and_batch() {
        assert_eq!(parse_observations(DELETE_DISTRIBUTION).unwrap().len(), 1);
        let batch = format!("[{0}, {0}]", DELETE_DISTRIBUTION);
        assert_eq!(parse_observations(&batch).unwrap().len(), 2);
        assert!(parse_observations(r#"{"event": "unknown"}"#).is_err());
    }

    #[tokio::test]
    async fn test_ingest_file_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("graph.json");
        let input = dir.path().join("obs.json");
        std::fs::write(
            &input,
            r#"[
                {
                    "event": "recordChanged",
                    "action": "CREATE",
                    "record": {
                        "recordId": "www.example.com",
                        "accountId": "111",
                        "zoneId": "Z1",
                        "recordType": "CNAME",
                        "values": ["d1.cloudfront.net"]
                    }
                },
                {
                    "event": "distributionDeleted",
                    "distribution": {
                        "distributionId": "E1",
                        "accountId": "111",
                        "domain": "d1.cloudfront.net"
                    }
                }
            ]"#,
        )
        .unwrap();

        let outcomes = execute(
            &Invocation::new(),
            &InquisitorConfig::default(),
            &store,
            &input,
        )
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 2);
        // the record targets a distribution name the graph does not hold
        let first = outcomes[0].chain.as_ref().unwrap();
        assert_eq!(first.dangling().count(), 1);
        let second = outcomes[1].chain.as_ref().unwrap();
        assert_eq!(second.elements[0].resource_id, "www.example.com");
        assert!(outcomes[1].message_id.is_some());
        assert!(store.exists());
    }
}
