//! Reference flood scenarios.
//!
//! Each vector names a ring, an origin and a hop budget together with the
//! participants that must receive the message. Every listed participant
//! must receive it exactly once and nobody else may receive it at all.

use std::collections::BTreeMap;

use anyhow::{ensure, Context};
use serde::Serialize;

use ring_relay_core::ParticipantId;

use crate::fixtures::{settle, TestRing};

/// A flood with its expected outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Ring of `p1..=p{ring_size}`.
    pub ring_size: usize,
    pub origin: &'static str,
    /// Hop budget; `None` uses the configured default.
    pub hops: Option<u32>,
    /// Participants that receive the message, sorted.
    pub receivers: &'static [&'static str],
}

/// Get all scenario vectors.
pub fn all_scenarios() -> Vec<ScenarioVector> {
    vec![
        ScenarioVector {
            name: "one hop reaches only the immediate neighbors",
            ring_size: 5,
            origin: "p1",
            hops: Some(1),
            receivers: &["p2", "p5"],
        },
        ScenarioVector {
            name: "default budget covers a ring of four",
            ring_size: 4,
            origin: "p1",
            hops: None,
            receivers: &["p2", "p3", "p4"],
        },
        ScenarioVector {
            name: "two hops from the middle of seven",
            ring_size: 7,
            origin: "p4",
            hops: Some(2),
            receivers: &["p2", "p3", "p5", "p6"],
        },
        ScenarioVector {
            name: "odd ring meets on the far side",
            ring_size: 5,
            origin: "p3",
            hops: None,
            receivers: &["p1", "p2", "p4", "p5"],
        },
        ScenarioVector {
            name: "ring of two sends both ways to the same peer",
            ring_size: 2,
            origin: "p2",
            hops: Some(10),
            receivers: &["p1"],
        },
        ScenarioVector {
            name: "lone participant has nobody to tell",
            ring_size: 1,
            origin: "p1",
            hops: None,
            receivers: &[],
        },
        ScenarioVector {
            name: "zero budget sends nothing",
            ring_size: 3,
            origin: "p2",
            hops: Some(0),
            receivers: &[],
        },
    ]
}

/// All vectors as pretty-printed JSON, for checking other implementations
/// against the same expectations.
pub fn scenarios_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_scenarios())
}

/// Run a vector on a fresh in-memory ring and count deliveries per
/// participant.
///
/// Must run inside a runtime with a paused clock, or it waits in real time
/// for the flood to settle.
pub async fn run_scenario(vector: &ScenarioVector) -> anyhow::Result<BTreeMap<ParticipantId, usize>> {
    let ring = TestRing::new(vector.ring_size)
        .await
        .with_context(|| format!("building ring for {:?}", vector.name))?;

    let payload = vector.name;
    match vector.hops {
        Some(hops) => ring.originate_with_ttl(vector.origin, payload, hops).await?,
        None => ring.originate(vector.origin, payload).await?,
    };
    settle().await;

    let counts = ring.recorder.receipts_of(&payload.to_string());
    ring.shutdown().await;
    Ok(counts)
}

/// Run a vector and check its outcome.
pub async fn check_scenario(vector: &ScenarioVector) -> anyhow::Result<()> {
    let counts = run_scenario(vector).await?;

    let receivers: Vec<&str> = counts.keys().map(|id| id.as_str()).collect();
    ensure!(
        receivers == vector.receivers,
        "{}: expected receivers {:?}, got {:?}",
        vector.name,
        vector.receivers,
        receivers
    );
    if let Some((id, n)) = counts.iter().find(|(_, n)| **n != 1) {
        anyhow::bail!("{}: {id} received the message {n} times", vector.name);
    }
    Ok(())
}

/// Check every vector, returning `(name, passed, detail)` per vector.
pub async fn verify_all_scenarios() -> Vec<(String, bool, String)> {
    let mut results = Vec::new();
    for vector in all_scenarios() {
        let outcome = check_scenario(&vector).await;
        let detail = match &outcome {
            Ok(()) => String::new(),
            Err(e) => format!("{e:#}"),
        };
        results.push((vector.name.to_string(), outcome.is_ok(), detail));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_are_well_formed() {
        for vector in all_scenarios() {
            let mut sorted = vector.receivers.to_vec();
            sorted.sort();
            assert_eq!(sorted, vector.receivers, "{}", vector.name);
            assert!(!vector.receivers.contains(&vector.origin), "{}", vector.name);
            assert!(vector.receivers.len() < vector.ring_size.max(1), "{}", vector.name);
        }
    }

    #[test]
    fn test_json_export_lists_every_vector() {
        let json: serde_json::Value = serde_json::from_str(&scenarios_json().unwrap()).unwrap();
        let vectors = json.as_array().unwrap();
        assert_eq!(vectors.len(), all_scenarios().len());
        assert_eq!(vectors[0]["receivers"], serde_json::json!(["p2", "p5"]));
        assert!(vectors[1]["hops"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_scenarios_pass() {
        for (name, passed, detail) in verify_all_scenarios().await {
            assert!(passed, "{name}: {detail}");
        }
    }
}
