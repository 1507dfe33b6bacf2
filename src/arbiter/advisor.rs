//! Remote advisory contract
//!
//! An advisor receives a [`StrategicSnapshot`] and answers with a free-text
//! recommendation. Transport is up to the implementor; the arbiter only
//! bounds the call and interprets the answer.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::arbiter::snapshot::StrategicSnapshot;
use crate::core::error::{Result, SimError};

/// Decoded advisory response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
    pub recommended_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Advice {
    pub fn new(recommended_action: impl Into<String>) -> Self {
        Self {
            recommended_action: recommended_action.into(),
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Decode a raw response body, tolerating prose around the JSON object
    pub fn parse(response: &str) -> Result<Self> {
        let json = extract_json(response)?;
        let advice: Advice = serde_json::from_str(json)
            .map_err(|e| SimError::MalformedResponse(format!("invalid advice JSON: {}", e)))?;
        if advice.recommended_action.trim().is_empty() {
            return Err(SimError::MalformedResponse("empty recommendedAction".into()));
        }
        Ok(advice)
    }
}

/// Extract the JSON object from a response that may carry surrounding text
fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| SimError::MalformedResponse("no JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| SimError::MalformedResponse("no closing brace found in response".into()))?;
    Ok(&response[start..=end])
}

pub type AdviceFuture = Pin<Box<dyn Future<Output = Result<Advice>> + Send + 'static>>;

/// Something that can be asked for a strategic recommendation
pub trait Advisor: Send + Sync {
    fn advise(&self, snapshot: StrategicSnapshot) -> AdviceFuture;
}

impl<F, Fut> Advisor for F
where
    F: Fn(StrategicSnapshot) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Advice>> + Send + 'static,
{
    fn advise(&self, snapshot: StrategicSnapshot) -> AdviceFuture {
        Box::pin((self)(snapshot))
    }
}
