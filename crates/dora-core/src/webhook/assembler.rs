//! Builds a [`CanonicalEvent`] by driving a provider parser.

use crate::{
    time,
    webhook::{json_text, EventParser, NormalizedPayload, ParserError, WebhookInput},
    CanonicalEvent,
};
use tracing::{debug, instrument};

/// Run `classify`, `extract_repo_name` and `extract_payload` in that order and
/// merge the results.
///
/// `date` is stamped with the current local date and `changeSha` is copied
/// from the body when present. Sentinel payloads (unknown or filtered) are
/// carried through unchanged; see [`is_sentinel`].
///
/// # Errors
///
/// Propagates the first error raised by the parser.
#[instrument(skip(parser, input), fields(provider = %parser.provider()))]
pub async fn assemble(
    parser: &dyn EventParser,
    input: &WebhookInput,
) -> Result<CanonicalEvent, ParserError> {
    let event_type = parser.classify(input).await?;
    let repo = parser.extract_repo_name(&input.body).await?;
    let payload = parser.extract_payload(input).await?;

    debug!(
        event_type = %event_type,
        repo = %repo,
        id = %payload.id,
        "Assembled canonical event"
    );

    Ok(CanonicalEvent {
        repo,
        event_type: Some(event_type),
        id: payload.id,
        change_sha: json_text(&input.body, "changeSha").unwrap_or_default(),
        event_time: payload.event_time,
        time_created: payload.time_created,
        time_resolved: payload.time_resolved.unwrap_or_default(),
        title: payload.title.unwrap_or_default(),
        message: payload.message,
        date: time::local_date_stamp(),
    })
}

/// Whether an assembled event came from an unknown or filtered payload
pub fn is_sentinel(event: &CanonicalEvent) -> bool {
    event.id == NormalizedPayload::UNKNOWN || (event.id.is_empty() && event.message.is_empty())
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
