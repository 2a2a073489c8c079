//! Shared RPC utilities for interacting with the Hedera JSON-RPC relay.

use std::{future::Future, time::Duration};

use alloy::transports::{RpcError, TransportError};

use crate::abi::decode_revert_reason;

/// Default interval between polling attempts when waiting for a result.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Whether `error` happened on the way to the relay rather than in its answer.
///
/// Only these are worth asking again; an error response or an unparseable
/// result will not change on the next attempt.
pub fn is_transport_error(error: &TransportError) -> bool {
    matches!(error, RpcError::Transport(_))
}

/// Render a relay error, including the decoded revert reason when it carries one.
pub fn describe_rpc_error(error: &TransportError) -> String {
    let Some(payload) = error.as_error_resp() else {
        return error.to_string();
    };

    match payload.as_revert_data() {
        Some(data) if !data.is_empty() => {
            format!("{} ({})", payload.message, decode_revert_reason(&data.to_string()))
        }
        _ => payload.message.to_string(),
    }
}

/// Poll `check_fn` until it yields a value.
///
/// Errors for which `is_transient` holds are logged and polled again; any other
/// error ends the wait. There is no overall deadline: a submitted transaction runs
/// to its network-determined outcome and a hung step is re-invoked by the operator.
pub async fn poll_until_some<T, E, F, Fut>(
    name: &str,
    interval: Duration,
    check_fn: F,
    is_transient: impl Fn(&E) -> bool,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let start = std::time::Instant::now();

    loop {
        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                tracing::trace!(
                    waiting_for = %name,
                    elapsed_secs = start.elapsed().as_secs(),
                    "Not available yet, polling again..."
                );
            }
            Err(e) if is_transient(&e) => {
                tracing::warn!(
                    error = %e,
                    waiting_for = %name,
                    "Poll attempt failed, polling again..."
                );
            }
            Err(e) => {
                return Err(
                    anyhow::Error::new(e).context(format!("Stopped waiting for {}", name))
                );
            }
        }

        tokio::time::sleep(interval).await;
    }
}
