//! Lunalytics API client
//!
//! Implements the four monitor endpoints of the Lunalytics REST API:
//! `/api/monitor/add`, `/api/monitor/edit`, `/api/monitor/delete` and `/api/monitor/id`.

use crate::error::LunalyticsError;
use crate::lunalytics_trait::LunalyticsClientTrait;
use crate::models::*;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info};

/// Lunalytics API client
#[derive(Debug, Clone)]
pub struct LunalyticsClient {
    client: Client,
    base_url: String,
    token: String,
}

impl LunalyticsClient {
    /// Create a new Lunalytics client
    ///
    /// # Arguments
    /// * `base_url` - Lunalytics base URL (e.g., "https://lunalytics.xyz")
    /// * `token` - API token sent as `Authorization: API Token <token>`
    pub fn new(base_url: String, token: String) -> Result<Self, LunalyticsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn auth_header(&self) -> String {
        format!("API Token {}", self.token)
    }

    fn monitor_url(&self, action: &str, monitor_id: Option<&str>) -> String {
        match monitor_id {
            Some(id) => format!(
                "{}/api/monitor/{}?monitorId={}",
                self.base_url,
                action,
                urlencoding::encode(id)
            ),
            None => format!("{}/api/monitor/{}", self.base_url, action),
        }
    }

    /// Turns a response into its body, or into a classified error.
    async fn handle_response(response: Response) -> Result<String, LunalyticsError> {
        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 200 {
            return Ok(body);
        }

        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown error").to_string()
                } else {
                    body.chars().take(500).collect()
                }
            });

        Err(LunalyticsError::from_status(status.as_u16(), message))
    }

    fn decode(body: &str) -> Result<MonitorResponse, LunalyticsError> {
        Ok(serde_json::from_str(body)?)
    }
}

#[async_trait::async_trait]
impl LunalyticsClientTrait for LunalyticsClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn add_monitor(&self, monitor: &MonitorCreate) -> Result<MonitorResponse, LunalyticsError> {
        info!("Creating monitor: {} -> {}", monitor.name, monitor.url);

        let response = self.client
            .post(self.monitor_url("add", None))
            .header("Authorization", self.auth_header())
            .json(monitor)
            .send()
            .await?;
        let created = Self::decode(&Self::handle_response(response).await?)?;

        info!("Monitor created successfully: {}", created.monitor_id);
        Ok(created)
    }

    async fn edit_monitor(&self, update: &MonitorUpdate) -> Result<MonitorResponse, LunalyticsError> {
        info!("Updating monitor: {}", update.monitor_id);

        let response = self.client
            .post(self.monitor_url("edit", None))
            .header("Authorization", self.auth_header())
            .json(update)
            .send()
            .await?;
        let updated = Self::decode(&Self::handle_response(response).await?)?;

        info!("Monitor updated successfully: {}", update.monitor_id);
        Ok(updated)
    }

    async fn delete_monitor(&self, monitor_id: &str) -> Result<(), LunalyticsError> {
        info!("Deleting monitor: {}", monitor_id);

        let response = self.client
            .get(self.monitor_url("delete", Some(monitor_id)))
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Self::handle_response(response).await?;

        info!("Monitor deleted successfully: {}", monitor_id);
        Ok(())
    }

    async fn get_monitor(&self, monitor_id: &str) -> Result<MonitorResponse, LunalyticsError> {
        debug!("Getting monitor: {}", monitor_id);

        let response = self.client
            .get(self.monitor_url("id", Some(monitor_id)))
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Self::decode(&Self::handle_response(response).await?)
    }
}
