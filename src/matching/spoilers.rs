use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use recap_core::{Match, SpoilerRisk};
use tracing::{debug, info};

/// Keep matches with no recorded risk or a risk at most `threshold`
pub fn filter_by_spoiler_risk(matches: Vec<Match>, risks: &HashMap<String, SpoilerRisk>, threshold: f64) -> Vec<Match> {
    let before = matches.len();
    let kept: Vec<Match> = matches
        .into_iter()
        .filter(|m| match risks.get(&m.segment_id) {
            Some(risk) if risk.risk > threshold => {
                debug!(
                    "Skipping {} ({:?}, risk {:.2})",
                    m.segment_id, risk.reason, risk.risk
                );
                false
            }
            _ => true,
        })
        .collect();

    if kept.len() < before {
        info!("🙈 Spoiler filter removed {} of {} candidates", before - kept.len(), before);
    }
    kept
}

/// Load a `segment_id -> risk` map. A missing file is an empty map.
pub async fn load_spoiler_risks<P: AsRef<Path>>(path: P) -> Result<HashMap<String, SpoilerRisk>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read spoiler risks from {}", path.display()))?;
    let risks = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse spoiler risks in {}", path.display()))?;
    Ok(risks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_core::SpoilerReason;
    use tempfile::TempDir;

    fn risk(value: f64) -> SpoilerRisk {
        SpoilerRisk {
            risk: value,
            reason: SpoilerReason::Ending,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_filter_keeps_unknown_and_low_risk() {
        let matches = vec![
            Match::new("safe", 0.0, 1.0, 0.9),
            Match::new("edge", 0.0, 1.0, 0.9),
            Match::new("ending", 0.0, 1.0, 0.9),
            Match::new("unknown", 0.0, 1.0, 0.9),
        ];
        let risks = HashMap::from([
            ("safe".to_string(), risk(0.1)),
            ("edge".to_string(), risk(0.3)),
            ("ending".to_string(), risk(0.95)),
        ]);

        let kept = filter_by_spoiler_risk(matches, &risks, 0.3);
        let ids: Vec<&str> = kept.iter().map(|m| m.segment_id.as_str()).collect();
        assert_eq!(ids, vec!["safe", "edge", "unknown"]);
    }

    #[tokio::test]
    async fn test_load_missing_and_present() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spoiler_risks.json");
        assert!(load_spoiler_risks(&path).await.unwrap().is_empty());

        tokio::fs::write(&path, r#"{"movie_000042": {"risk": 0.8, "reason": "character_death", "confidence": 0.7}}"#)
            .await
            .unwrap();
        let risks = load_spoiler_risks(&path).await.unwrap();
        assert_eq!(risks["movie_000042"].reason, SpoilerReason::CharacterDeath);
    }
}
