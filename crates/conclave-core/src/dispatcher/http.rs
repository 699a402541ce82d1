//! HTTP agent invoker
//!
//! Each role maps to an endpoint that accepts the call as a JSON POST and
//! answers with an `AgentOutput` body.

use super::invoker::{AgentCall, AgentError, AgentInvoker, AgentOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Connection settings for one agent role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEndpointConfig {
    /// URL the call is POSTed to
    pub endpoint: String,
    /// Bearer token sent with the call
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Serialize)]
struct AgentRequestBody<'a> {
    role: &'a str,
    #[serde(flatten)]
    call: &'a AgentCall,
}

/// Agent invoker over HTTP
pub struct HttpAgentInvoker {
    client: reqwest::Client,
    endpoints: HashMap<String, AgentEndpointConfig>,
}

impl HttpAgentInvoker {
    /// Create an invoker for the configured roles
    #[must_use]
    pub fn new(endpoints: HashMap<String, AgentEndpointConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    /// Use a preconfigured client
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Configured roles
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}

#[async_trait]
impl AgentInvoker for HttpAgentInvoker {
    async fn invoke(&self, role: &str, call: &AgentCall) -> Result<AgentOutput, AgentError> {
        let endpoint = self
            .endpoints
            .get(role)
            .ok_or_else(|| AgentError::NotConfigured(role.to_string()))?;

        let mut request = self
            .client
            .post(&endpoint.endpoint)
            .json(&AgentRequestBody { role, call });
        if let Some(key) = &endpoint.api_key {
            request = request.bearer_auth(key);
        }

        debug!(role = %role, endpoint = %endpoint.endpoint, "Invoking agent");
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Remote(format!("{status}: {body}")));
        }

        response
            .json::<AgentOutput>()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::Timeout
    } else {
        AgentError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_replay::DecisionRequest;

    #[tokio::test]
    async fn test_unknown_role_is_not_configured() {
        let invoker = HttpAgentInvoker::new(HashMap::new());
        let call = AgentCall::new("c1", &DecisionRequest::new("x"));

        let err = invoker.invoke("finance", &call).await.unwrap_err();
        assert!(matches!(err, AgentError::NotConfigured(role) if role == "finance"));
    }

    #[test]
    fn test_request_body_shape() {
        let call = AgentCall::new("c1", &DecisionRequest::new("ship it"));
        let body = serde_json::to_value(AgentRequestBody {
            role: "qa",
            call: &call,
        })
        .unwrap();

        assert_eq!(body["role"], "qa");
        assert_eq!(body["prompt"], "ship it");
        assert_eq!(body["type"], "request");
        assert_eq!(body["conversation_id"], "c1");
    }

    #[test]
    fn test_output_parsing_is_lenient() {
        let output: AgentOutput =
            serde_json::from_str(r#"{"decision": "no-response"}"#).unwrap();
        assert_eq!(output.confidence, 0.0);
        assert!(output.usage.is_none());

        let output: AgentOutput = serde_json::from_str(
            r#"{"decision": "approved", "confidence": 0.8, "usage": {"model": "m", "tokens": 12}}"#,
        )
        .unwrap();
        assert_eq!(output.usage.unwrap().cost_usd, None);
    }
}
