//! Client for the progression generation service

use std::time::Duration;

use harmony_core::ProgressionPayload;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation service returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("Generation service unreachable: {0}")]
    Transport(String),
    #[error("Invalid progression payload: {0}")]
    Decode(#[from] std::io::Error),
}

/// Request body for `POST /generate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    /// Seed progression, e.g. `"I-vi-IV"`
    pub seed: String,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: "I".into(),
            length: 8,
            temperature: None,
        }
    }
}

pub struct GenerationClient {
    base_url: String,
    agent: ureq::Agent,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn generate(&self, params: &GenerationParams) -> Result<ProgressionPayload, GenerationError> {
        let url = format!("{}/generate", self.base_url);
        debug!(%url, seed = %params.seed, length = params.length, "Requesting progression");

        let response = self.agent.post(&url).send_json(params).map_err(|err| match err {
            ureq::Error::Status(code, response) => GenerationError::Status {
                code,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => GenerationError::Transport(transport.to_string()),
        })?;

        let payload: ProgressionPayload = response.into_json()?;
        info!(chords = payload.chords.len(), "Received progression");
        Ok(payload)
    }
}

impl Default for GenerationClient {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}
