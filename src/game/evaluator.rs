use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EvaluatorError;

/// External engine that scores a position in pawns from White's point of view
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, fen: &str) -> Result<f64, EvaluatorError>;
}

/// Client for a `POST {fen} -> {eval}` evaluation endpoint
#[derive(Debug, Clone)]
pub struct HttpEvaluator {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct EvaluateRequest<'a> {
    fen: &'a str,
}

#[derive(Deserialize)]
struct EvaluateResponse {
    eval: Option<f64>,
}

impl HttpEvaluator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EvaluatorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(&self, fen: &str) -> Result<f64, EvaluatorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EvaluateRequest { fen })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvaluatorError::Status(status.as_u16()));
        }

        let body: EvaluateResponse = response.json().await?;
        body.eval.ok_or(EvaluatorError::MissingEval)
    }
}
