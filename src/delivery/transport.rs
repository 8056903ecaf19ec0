//! Consumer transport contract

use std::future::Future;

use bytes::Bytes;

use crate::error::TransportError;

/// Write side of one viewer connection
///
/// Each payload is one complete frame; framing on the wire is up to the
/// implementation (one WebSocket binary message per frame, one multipart
/// chunk, ...).
pub trait Transport: Send + 'static {
    /// Deliver one frame payload
    fn send_frame(
        &mut self,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection; called once when delivery ends
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
