//! Bounded waits for store and transport calls.
//!
//! Every suspension point in a handler goes through one of these, so a stuck
//! platform or disk stalls one conversation, never the whole bridge.

use std::{future::Future, time::Duration};

use switchboard_core::transport::TransportError;
use tokio::time::timeout;

use crate::error::BridgeError;

/// Await a store call; I/O failures and timeouts both become
/// [`BridgeError::Store`].
pub(crate) async fn store_call<T, E, F>(limit: Duration, fut: F) -> Result<T, BridgeError>
where
  F: Future<Output = Result<T, E>>,
  E: std::error::Error + Send + Sync + 'static,
{
  match timeout(limit, fut).await {
    Ok(res) => res.map_err(BridgeError::store),
    Err(elapsed) => Err(BridgeError::store(elapsed)),
  }
}

/// Await a transport call; a timeout becomes [`TransportError::Timeout`].
pub(crate) async fn transport_call<T, F>(limit: Duration, fut: F) -> Result<T, TransportError>
where
  F: Future<Output = Result<T, TransportError>>,
{
  timeout(limit, fut)
    .await
    .unwrap_or(Err(TransportError::Timeout))
}
