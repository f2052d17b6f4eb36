use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use snafu::ResultExt;

use crate::config::ChatConfig;
use crate::error::{
    BuildClientSnafu, ExchangeResult, RequestSnafu, StatusSnafu, TransportError, TransportSnafu,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw response body, chunk by chunk, as the connection delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Body of the outbound chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

/// Opens the streamed response for one exchange.
///
/// Implementations resolve once response headers are in: a non-success status
/// must be reported as [`crate::ExchangeError::Status`] carrying the whole
/// response body, never as a byte stream.
pub trait ChatTransport: Send + Sync {
    fn open_stream(&self, request: ChatRequest) -> BoxFuture<'_, ExchangeResult<ByteStream>>;
}

/// [`ChatTransport`] over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &ChatConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .context(BuildClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self {
            client,
            url: config.stream_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self, request: ChatRequest) -> ExchangeResult<ByteStream> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context(RequestSnafu {
                stage: "send-chat-request",
            })
            .context(TransportSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .context(RequestSnafu {
                    stage: "read-error-body",
                })
                .context(TransportSnafu)?;
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let body = response.bytes_stream().map(|chunk| {
            chunk.context(RequestSnafu {
                stage: "read-stream-chunk",
            })
        });
        Ok(Box::pin(body))
    }
}

impl ChatTransport for HttpTransport {
    fn open_stream(&self, request: ChatRequest) -> BoxFuture<'_, ExchangeResult<ByteStream>> {
        Box::pin(self.open(request))
    }
}
