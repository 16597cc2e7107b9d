// Scorecard fetcher - turns the raw API envelope into a ScorecardResult
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scorecard_api::{ScorecardClient, ScorecardResponse};
use tracing::{debug, warn};

use crate::{
    models::{Check, ScorecardResult},
    Result,
};

/// Where score data comes from. A 404 must come back as `Error::NotFound`.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn fetch_score(&self, lookup_key: &str, token: Option<&str>) -> Result<ScorecardResult>;
}

pub struct ScorecardFetcher {
    client: ScorecardClient,
}

impl ScorecardFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: ScorecardClient::new()?,
        })
    }

    pub fn with_endpoint(endpoint: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ScorecardClient::with_timeout(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl ScoreSource for ScorecardFetcher {
    async fn fetch_score(&self, lookup_key: &str, token: Option<&str>) -> Result<ScorecardResult> {
        let response = self.client.get_project(lookup_key, token).await?;
        debug!(
            repository = lookup_key,
            score = response.score,
            checks = response.checks.len(),
            "Fetched scorecard"
        );
        Ok(normalize(lookup_key, response))
    }
}

fn normalize(lookup_key: &str, response: ScorecardResponse) -> ScorecardResult {
    let repository = if response.repo.name.is_empty() {
        lookup_key.to_string()
    } else {
        response.repo.name
    };

    let timestamp = parse_date(&response.date).unwrap_or_else(|| {
        warn!(
            repository = %repository,
            date = %response.date,
            "Unparseable scorecard date, using current time"
        );
        Utc::now()
    });

    ScorecardResult {
        repository,
        commit: response.repo.commit,
        overall_score: response.score,
        checks: response
            .checks
            .into_iter()
            .map(|c| Check {
                name: c.name,
                score: c.score,
                reason: c.reason,
            })
            .collect(),
        timestamp,
    }
}

/// RFC 3339 normally, but older results only carry a calendar date
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckStatus;
    use chrono::TimeZone;

    fn response(date: &str) -> ScorecardResponse {
        serde_json::from_value(serde_json::json!({
            "date": date,
            "repo": {"name": "github.com/acme/widgets", "commit": "abc123"},
            "score": 5.5,
            "checks": [
                {"name": "Maintained", "score": 7, "reason": "active"},
                {"name": "Fuzzing", "score": 3, "reason": "partial"},
                {"name": "Packaging", "score": -1, "reason": "inconclusive"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_keeps_order_and_derives_status() {
        let result = normalize("github.com/acme/widgets", response("2025-01-06T12:00:00Z"));

        assert_eq!(result.repository, "github.com/acme/widgets");
        assert_eq!(result.commit, "abc123");
        assert_eq!(result.overall_score, 5.5);
        assert_eq!(
            result.timestamp,
            Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap()
        );

        let statuses: Vec<CheckStatus> = result.checks.iter().map(Check::status).collect();
        assert_eq!(
            statuses,
            vec![CheckStatus::Pass, CheckStatus::Fail, CheckStatus::Unknown]
        );
    }

    #[test]
    fn test_bad_date_falls_back_to_now() {
        let before = Utc::now();
        let result = normalize("github.com/acme/widgets", response("last tuesday"));
        assert!(result.timestamp >= before);
    }

    #[test]
    fn test_date_only() {
        assert_eq!(
            parse_date("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_repo_name_uses_lookup_key() {
        let raw: ScorecardResponse = serde_json::from_value(serde_json::json!({
            "score": 1.0,
            "date": "2025-01-06T12:00:00Z"
        }))
        .unwrap();

        let result = normalize("gitlab.com/acme/widgets", raw);
        assert_eq!(result.repository, "gitlab.com/acme/widgets");
        assert!(result.checks.is_empty());
    }
}
