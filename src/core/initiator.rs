//! Starts a flow run and decodes where its output will come from.

use serde_json::Value;
use tracing::debug;

use crate::api::RunFlowRequest;
use crate::core::chat_stream::summarize_error_body;
use crate::core::constants::RUN_FLOW_PATH;
use crate::core::error::InitiationError;
use crate::utils::url::construct_api_url;

/// Result of starting a run: either the final text is already available, or
/// the run is still producing output behind a stream locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunHandle {
    Inline(String),
    Streamed(String),
}

const INLINE_TEXT_POINTERS: [&str; 3] = [
    "/outputs/message/message/text",
    "/message/message/text",
    "/results/message/text",
];

pub fn run_flow_url(base_url: &str, flow_id: &str) -> String {
    construct_api_url(base_url, &format!("{RUN_FLOW_PATH}/{flow_id}"))
}

/// Pick the run handle out of a successful run response. Only the first
/// output of the first executed component is considered.
pub fn decode_run_response(body: &Value, stream_requested: bool) -> Result<RunHandle, InitiationError> {
    let first_output = body.pointer("/outputs/0/outputs/0").ok_or_else(|| {
        InitiationError::UnexpectedShape("no component output in run response".to_string())
    })?;

    if stream_requested {
        let locator = first_output
            .pointer("/artifacts/stream_url")
            .and_then(Value::as_str)
            .filter(|url| !url.trim().is_empty());
        if let Some(url) = locator {
            return Ok(RunHandle::Streamed(url.to_string()));
        }
    }

    INLINE_TEXT_POINTERS
        .iter()
        .find_map(|pointer| first_output.pointer(pointer).and_then(Value::as_str))
        .map(|text| RunHandle::Inline(text.to_string()))
        .ok_or_else(|| {
            InitiationError::UnexpectedShape(
                "first output carries neither message text nor a stream_url".to_string(),
            )
        })
}

/// Issue the run request once. Cancellation is the caller's concern: dropping
/// the returned future aborts the request.
pub async fn initiate(
    client: &reqwest::Client,
    url: &str,
    request: &RunFlowRequest,
) -> Result<RunHandle, InitiationError> {
    debug!(url, stream = request.stream, "Starting flow run");

    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(request)
        .send()
        .await
        .map_err(|err| InitiationError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        debug!(url, status = status.as_u16(), "Flow run rejected");
        return Err(InitiationError::Status {
            status: status.as_u16(),
            detail: summarize_error_body(&error_text),
        });
    }

    let body = response
        .json::<Value>()
        .await
        .map_err(|err| InitiationError::InvalidBody(err.to_string()))?;

    let handle = decode_run_response(&body, request.stream)?;
    debug!(
        streamed = matches!(handle, RunHandle::Streamed(_)),
        "Flow run started"
    );
    Ok(handle)
}
