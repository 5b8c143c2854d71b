pub mod client;
pub mod schema;

use std::time::Duration;

pub use client::{data_url, DescriptionClient, HttpDescriptionClient};
pub use schema::{AnalysisReply, AnalysisResult, DescribeRequest, ModeContext, RawReply, TrafficMode};

use crate::capture::EncodedFrame;
use crate::error::{AnalysisError, EngineError};

/// One call to the service, bounded by `timeout` and validated into a mode-tagged reply.
/// Failures are not retried here.
pub async fn describe(
    client: &dyn DescriptionClient,
    frame: &EncodedFrame,
    context: &ModeContext,
    timeout: Duration,
) -> Result<AnalysisReply, EngineError> {
    let raw = tokio::time::timeout(timeout, client.analyze(frame, context))
        .await
        .map_err(|_| AnalysisError::Timeout(timeout))??;

    Ok(raw.validate(context)?)
}
