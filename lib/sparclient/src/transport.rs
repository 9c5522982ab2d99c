use crate::error::TransportError;
use oxhttp::model::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use oxhttp::model::{Method, Request};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::Builder;
use std::time::Duration;
use tracing::{debug, trace};

/// Number of body chunks the HTTP thread may read ahead of the consumer.
const BODY_QUEUE_CAPACITY: usize = 16;
const BODY_CHUNK_SIZE: usize = 16 * 1024;

/// A form POST to a SPARQL endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    /// The `application/x-www-form-urlencoded` body.
    pub form: String,
    pub accept: Option<String>,
    pub user_agent: String,
    /// Sent as the `Timeout` header, for the endpoint to enforce.
    pub timeout: Option<Duration>,
}

/// The answer of the endpoint, whatever its status.
pub struct TransportResponse {
    pub status: u16,
    /// The raw `Content-Type` header, parameters included.
    pub content_type: Option<String>,
    pub body: Box<dyn Read + Send>,
}

/// Sends requests to SPARQL endpoints.
///
/// [`HttpTransport`] is the default implementation. Other implementations can add
/// authentication, or answer in-process.
pub trait Transport: Send + Sync {
    fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// An HTTP(S) transport based on [`oxhttp`].
///
/// Each exchange runs on its own thread: the response body is read there and handed over
/// through a bounded queue, so the returned body can itself be moved to another thread.
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<oxhttp::Client>,
}

impl HttpTransport {
    /// `timeout` bounds each whole exchange on the client side, independently of the
    /// `Timeout` header sent to the endpoint.
    pub fn new(timeout: Option<Duration>, redirection_limit: usize) -> Self {
        let mut client = oxhttp::Client::new().with_redirection_limit(redirection_limit);
        if let Some(timeout) = timeout {
            client = client.with_global_timeout(timeout);
        }
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None, 8)
    }
}

type ResponseHead = (u16, Option<String>);

impl Transport for HttpTransport {
    fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&request.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(USER_AGENT, &request.user_agent);
        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.header("Timeout", timeout.as_secs().max(1).to_string());
        }
        let http_request = builder
            .body(request.form.into_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let client = Arc::clone(&self.client);
        let (head_sender, head_receiver) = sync_channel::<io::Result<ResponseHead>>(1);
        let (chunk_sender, chunk_receiver) = sync_channel(BODY_QUEUE_CAPACITY);
        Builder::new()
            .name("http-exchange".into())
            .spawn(move || {
                let response = match client.request(http_request) {
                    Ok(response) => response,
                    Err(e) => {
                        if head_sender.send(Err(e)).is_err() {
                            trace!("HTTP exchange abandoned before the response");
                        }
                        return;
                    }
                };
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(ToOwned::to_owned);
                if head_sender
                    .send(Ok((response.status().as_u16(), content_type)))
                    .is_err()
                {
                    return;
                }
                pump_body(response.into_body(), &chunk_sender);
            })?;
        let (status, content_type) = head_receiver
            .recv()
            .map_err(|_| io::Error::other("The HTTP exchange thread stopped unexpectedly"))??;
        Ok(TransportResponse {
            status,
            content_type,
            body: Box::new(ChannelReader {
                receiver: chunk_receiver,
                chunk: Vec::new(),
                position: 0,
            }),
        })
    }
}

/// Copies the body into the queue until it ends, fails or the reader is dropped.
fn pump_body(mut body: impl Read, sender: &SyncSender<io::Result<Vec<u8>>>) {
    loop {
        let mut chunk = vec![0; BODY_CHUNK_SIZE];
        let message = match body.read(&mut chunk) {
            Ok(0) => return,
            Ok(len) => {
                chunk.truncate(len);
                Ok(chunk)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        let failed = message.is_err();
        if sender.send(message).is_err() {
            debug!("Response body dropped before the end of the stream");
            return;
        }
        if failed {
            return;
        }
    }
}

/// A [`Read`] over the chunks sent by the HTTP exchange thread.
struct ChannelReader {
    receiver: Receiver<io::Result<Vec<u8>>>,
    chunk: Vec<u8>,
    position: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position >= self.chunk.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.chunk = chunk?;
                    self.position = 0;
                }
                // The sender is dropped at the end of the body
                Err(_) => return Ok(0),
            }
        }
        let len = buf.len().min(self.chunk.len() - self.position);
        buf[..len].copy_from_slice(&self.chunk[self.position..self.position + len]);
        self.position += len;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_reader_concatenates_chunks() -> io::Result<()> {
        let (sender, receiver) = sync_channel(4);
        sender.send(Ok(b"hello ".to_vec())).map_err(io::Error::other)?;
        sender.send(Ok(Vec::new())).map_err(io::Error::other)?;
        sender.send(Ok(b"world".to_vec())).map_err(io::Error::other)?;
        drop(sender);
        let mut reader = ChannelReader {
            receiver,
            chunk: Vec::new(),
            position: 0,
        };
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        assert_eq!(text, "hello world");
        Ok(())
    }

    #[test]
    fn channel_reader_forwards_errors() -> io::Result<()> {
        let (sender, receiver) = sync_channel(4);
        sender
            .send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            .map_err(io::Error::other)?;
        let mut reader = ChannelReader {
            receiver,
            chunk: Vec::new(),
            position: 0,
        };
        let error = reader.read(&mut [0; 8]).err();
        assert_eq!(
            error.map(|e| e.kind()),
            Some(io::ErrorKind::ConnectionReset)
        );
        Ok(())
    }
}
