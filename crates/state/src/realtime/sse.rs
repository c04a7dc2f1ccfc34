//! Server-sent events transport.
//!
//! The event stream is `GET /api/realtime?sessionId=…`; interest is announced
//! with `POST /api/realtime/join`. Comment lines (`: ping`) are heartbeats.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Method;
use shopfront_core::SessionId;
use tracing::{debug, instrument};

use super::{ChannelError, Connection, Frame, Interest, RawEvent, Transport};
use crate::api::StoreApiClient;

const STREAM_PATH: &str = "/api/realtime";
const JOIN_PATH: &str = "/api/realtime/join";

/// Opens SSE connections through the store API client.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: StoreApiClient,
    session: SessionId,
}

impl SseTransport {
    #[must_use]
    pub const fn new(client: StoreApiClient, session: SessionId) -> Self {
        Self { client, session }
    }
}

#[async_trait]
impl Transport for SseTransport {
    #[instrument(skip(self), fields(session = %self.session))]
    async fn connect(&self) -> Result<Box<dyn Connection>, ChannelError> {
        let mut url = self
            .client
            .endpoint(STREAM_PATH)
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("sessionId", self.session.as_str());

        let response = self
            .client
            .request_url(Method::GET, url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChannelError::Connect(format!(
                "event stream returned HTTP {}",
                response.status()
            )));
        }
        debug!("Event stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(Box::new(SseConnection {
            client: self.client.clone(),
            stream,
            decoder: SseDecoder::default(),
        }))
    }
}

/// An open SSE stream.
pub struct SseConnection {
    client: StoreApiClient,
    stream: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
}

#[async_trait]
impl Connection for SseConnection {
    async fn announce(&mut self, interest: &Interest) -> Result<(), ChannelError> {
        let response = self
            .client
            .request(Method::POST, JOIN_PATH)
            .map_err(|e| ChannelError::Announce(e.to_string()))?
            .json(interest)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChannelError::Announce(format!(
                "join returned HTTP {}",
                response.status()
            )));
        }
        debug!(session = %interest.session, admin = interest.admin, "Announced interest");
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<Frame>, ChannelError> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Ok(Some(frame));
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => self.decoder.feed(&chunk),
                Some(Err(e)) => return Err(ChannelError::Stream(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Append raw bytes from the stream.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode the next complete frame, if the buffer holds one.
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if self.data.is_empty() && self.event.is_none() {
                    continue;
                }
                let name = self.event.take().unwrap_or_else(|| "message".to_string());
                let data = std::mem::take(&mut self.data).join("\n");
                return Some(Frame::Event(RawEvent::new(name, data)));
            }
            if line.starts_with(':') {
                return Some(Frame::Heartbeat);
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        None
    }
}
