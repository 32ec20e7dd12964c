use std::future::Future;
use std::time::Duration;

use cypherloop_core::error::PipelineError;
use cypherloop_core::types::OracleReply;
use log::warn;
use tokio::time::Instant;

/// Outcome of one bounded oracle call together with its wall-clock time.
pub struct TimedCall<T> {
    pub result: Result<OracleReply<T>, PipelineError>,
    pub elapsed: Duration,
}

/// Time one oracle call may take: its own limit, cut short by the request deadline.
pub(crate) fn budget(limit: Duration, deadline: Instant) -> Duration {
    limit.min(deadline.saturating_duration_since(Instant::now()))
}

/// Runs an oracle call under `limit` and maps every failure onto the pipeline
/// taxonomy: contract violations keep their identity, everything else (timeouts
/// included) becomes `OracleTimeoutOrTransport`. A zero limit fails without
/// starting the call.
pub(crate) async fn bounded<T, F>(call_site: &'static str, limit: Duration, call: F) -> TimedCall<T>
where
    F: Future<Output = anyhow::Result<OracleReply<T>>>,
{
    if limit.is_zero() {
        let error = PipelineError::transport(call_site, "request deadline exceeded");
        warn!("{}", error);
        return TimedCall {
            result: Err(error),
            elapsed: Duration::ZERO,
        };
    }

    let started = Instant::now();
    let outcome = tokio::time::timeout(limit, call).await;
    let elapsed = started.elapsed();

    let result = match outcome {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) => Err(classify(call_site, e)),
        Err(_) => Err(PipelineError::transport(
            call_site,
            format!("timed out after {:.1}s", limit.as_secs_f64()),
        )),
    };
    if let Err(e) = &result {
        warn!("{}", e);
    }
    TimedCall { result, elapsed }
}

fn classify(call_site: &'static str, error: anyhow::Error) -> PipelineError {
    match error.downcast_ref::<PipelineError>() {
        Some(PipelineError::OracleContractViolation {
            call_site: site,
            reason,
        }) => PipelineError::contract(*site, reason.clone()),
        _ => PipelineError::transport(call_site, format!("{:#}", error)),
    }
}
