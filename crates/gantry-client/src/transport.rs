//! Transport seam for the control channel
//!
//! The channel only needs to open a link and move text frames over it; the
//! WebSocket implementation below is the one the launch service speaks.

use crate::error::ChannelError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// Opens links to the launch service
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Link>, ChannelError>;
}

/// An established, bidirectional text-frame link
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError>;

    /// Next text frame. `None` means the peer closed the link.
    async fn recv(&mut self) -> Option<Result<String, ChannelError>>;

    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// WebSocket transport (`ws://` and `wss://`)
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Link>, ChannelError> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| ChannelError::connect(endpoint, e))?;
        tracing::debug!(endpoint = %endpoint, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(ChannelError::transport)
    }

    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "launch service closed the link");
                    return None;
                }
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Some(Err(ChannelError::transport(e))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.stream
            .close(None)
            .await
            .map_err(ChannelError::transport)
    }
}
