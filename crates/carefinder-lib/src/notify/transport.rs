//! Connection seam between the channel state machine and the network.

use std::future::Future;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::{Error, Result};

/// Text frames received on one connection. The stream ends when the peer
/// closes the connection; an `Err` item reports a broken connection.
pub type MessageStream = BoxStream<'static, Result<String>>;

/// Opens receive-only connections to the notification backend.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<MessageStream>> + Send;

    /// Endpoint description for logging.
    fn endpoint(&self) -> &str;
}

/// WebSocket transport.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<MessageStream> {
        let (socket, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|err| Error::Transport {
                message: err.to_string(),
            })?;
        debug!(url = %self.url, status = %response.status(), "websocket handshake complete");

        let frames = socket.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                // Control frames are handled by tungstenite; close ends the stream.
                Ok(_) => None,
                Err(err) => Some(Err(Error::Transport {
                    message: err.to_string(),
                })),
            }
        });
        Ok(frames.boxed())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
