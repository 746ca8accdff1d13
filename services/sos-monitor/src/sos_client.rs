//! Client for the SOS endpoints of the operations backend

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::alert::{AlertRecord, AlertStatus};
use crate::io::HttpClient;

/// Source of SOS alert snapshots
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AlertSource: Send + Sync {
    /// Fetch the complete current alert list
    async fn fetch_alerts(&self, token: &str) -> crate::Result<Vec<AlertRecord>>;

    /// Set the status (and optional comment) of one alert
    async fn update_status(
        &self,
        token: &str,
        id: i64,
        status: AlertStatus,
        comment: Option<String>,
    ) -> crate::Result<AlertRecord>;
}

/// REST client for `GET /sos` and `PATCH /sos/{id}/status`
pub struct SosApiClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for SosApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SosApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SosApiClient {
    pub fn new(base_url: &str, http: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::debug!("Created SosApiClient for {}", base_url);
        Self { base_url, http }
    }
}

#[async_trait]
impl AlertSource for SosApiClient {
    async fn fetch_alerts(&self, token: &str) -> crate::Result<Vec<AlertRecord>> {
        let url = format!("{}/sos", self.base_url);
        let response = self.http.get(&url, token).await?;

        if !response.is_success() {
            tracing::debug!(
                "Non-success response fetching SOS list: status={}",
                response.status
            );
            return Err(crate::SosMonitorError::Api {
                status: response.status,
                body: response.body,
            });
        }

        let records: Vec<serde_json::Value> = serde_json::from_str(&response.body)?;
        let total = records.len();
        let alerts: Vec<AlertRecord> = records
            .into_iter()
            .filter_map(|record| match AlertRecord::deserialize(&record) {
                Ok(alert) => Some(alert),
                Err(e) => {
                    tracing::warn!("Skipping malformed SOS record {}: {}", record["id"], e);
                    None
                }
            })
            .collect();
        tracing::debug!("Fetched {} of {} SOS records", alerts.len(), total);
        Ok(alerts)
    }

    async fn update_status(
        &self,
        token: &str,
        id: i64,
        status: AlertStatus,
        comment: Option<String>,
    ) -> crate::Result<AlertRecord> {
        let url = format!("{}/sos/{}/status", self.base_url, id);
        let mut body = serde_json::json!({ "status": status });
        if let Some(comment) = comment {
            body["comment"] = serde_json::Value::String(comment);
        }

        tracing::debug!("Updating SOS {} to {}", id, status.as_str());
        let response = self.http.patch_json(&url, token, &body).await?;

        if !response.is_success() {
            return Err(crate::SosMonitorError::Api {
                status: response.status,
                body: response.body,
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}
