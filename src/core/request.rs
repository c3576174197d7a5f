//! Builds the run request for one turn.
//!
//! The whole conversation is folded into a single transcript because the
//! flow takes one input value per run.

use crate::api::{RunFlowRequest, TweakMap};
use crate::core::constants::{CHAT_IO_KIND, TRANSCRIPT_PREAMBLE, TRANSCRIPT_SUFFIX};
use crate::core::flow::Component;
use crate::core::message::ConversationTurn;

pub fn build_transcript(history: &[ConversationTurn]) -> String {
    let mut transcript = String::from(TRANSCRIPT_PREAMBLE);
    for turn in history {
        transcript.push_str(turn.role.as_str());
        transcript.push_str(":\n");
        transcript.push_str(turn.content.trim());
        transcript.push_str("\n\n");
    }
    transcript.push_str(TRANSCRIPT_SUFFIX);
    transcript
}

/// Collect the set overrides of every component. Each component gets an
/// entry, possibly empty; unset tweaks are left out so the service applies
/// its own defaults.
pub fn collect_tweaks(components: &[Component]) -> TweakMap {
    components
        .iter()
        .map(|component| {
            let values = component
                .tweaks
                .iter()
                .filter_map(|tweak| {
                    tweak
                        .present_value()
                        .map(|value| (tweak.name.clone(), value.clone()))
                })
                .collect();
            (component.id.clone(), values)
        })
        .collect()
}

pub fn build_run_request(
    history: &[ConversationTurn],
    stream: bool,
    components: &[Component],
) -> RunFlowRequest {
    RunFlowRequest {
        input_value: build_transcript(history),
        input_type: CHAT_IO_KIND.to_string(),
        output_type: CHAT_IO_KIND.to_string(),
        stream,
        tweaks: collect_tweaks(components),
    }
}
