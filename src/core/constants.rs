//! Shared constants used across the application

use std::time::Duration;

/// Opening line of the transcript sent as the flow's input value.
pub const TRANSCRIPT_PREAMBLE: &str = "Here is our conversation so far: \n\n";

/// Closing line of the transcript; asks the flow to produce the next reply.
pub const TRANSCRIPT_SUFFIX: &str = "Now it is your turn to reply: \n\n";

/// Input and output kind sent with every run request.
pub const CHAT_IO_KIND: &str = "chat";

/// Default base URL of the flow-execution service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7860";

/// Path segment prefix for starting a flow run; the flow id is appended.
pub const RUN_FLOW_PATH: &str = "api/v1/run";

/// Catalog listing path relative to the catalog base URL.
pub const CATALOG_PATH: &str = "store/components/all";

/// Upper bound on the total duration of one turn.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Interval between animation steps (roughly one display frame).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Each animation step drains about 1/N of the pending text.
pub const ANIMATION_DRAIN_DIVISOR: usize = 60;

/// Notice prepended to stream diagnostics when the service answers 401.
pub const UNAUTHORIZED_NOTICE: &str =
    "Unauthorized access: the flow service rejected this request. Check the service URL and its access settings.";
