use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::flow::TweakValue;

/// Overrides keyed by component id, then by tweak name.
pub type TweakMap = BTreeMap<String, BTreeMap<String, TweakValue>>;

/// Body of the request that starts one flow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFlowRequest {
    pub input_value: String,
    pub input_type: String,
    pub output_type: String,
    pub stream: bool,
    pub tweaks: TweakMap,
}

/// Payload of one `message` event on the run's output stream.
#[derive(Debug, Deserialize)]
pub struct StreamChunkPayload {
    #[serde(default)]
    pub chunk: Option<String>,
}

pub mod flows;
