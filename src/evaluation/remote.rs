use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{NetworkEvaluator, SolverResult};
use crate::domain::ZonalValues;
use crate::power_flow::NetworkSnapshot;

#[derive(Debug, Serialize)]
struct EvaluationRequest<'a> {
    network_id: &'a str,
    shifts: &'a ZonalValues,
}

/// External loadflow/RAO service reached over HTTP.
///
/// `POST {base_url}/evaluate` with `{ network_id, shifts }`, answer is a
/// [`SolverResult`]. The service owns the network files and applies the
/// shifts to its own copy.
#[derive(Debug, Clone)]
pub struct RemoteEvaluator {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteEvaluator {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("building solver HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NetworkEvaluator for RemoteEvaluator {
    async fn evaluate(&self, network: &NetworkSnapshot, shifts: &ZonalValues) -> Result<SolverResult> {
        let url = format!("{}/evaluate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EvaluationRequest {
                network_id: &network.id,
                shifts,
            })
            .send()
            .await
            .with_context(|| format!("calling solver at {url}"))?
            .error_for_status()
            .context("solver rejected evaluation request")?;

        response
            .json::<SolverResult>()
            .await
            .context("decoding solver result")
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
