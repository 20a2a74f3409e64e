//! Transport trait, the seam between the fetch pipeline and the network

use std::fmt::{self, Debug};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};

use crate::error::TransportError;

/// Stream of body chunks
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Stream body transmission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    /// Request body is fully sent before the response is read
    Half,
}

/// Body handed to the transport
pub enum RequestBody {
    /// Complete body
    Bytes(Bytes),
    /// Streamed body
    Stream(BodyStream),
}

impl Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl RequestBody {
    /// Read the whole body
    pub async fn collect(self) -> Result<Bytes, TransportError> {
        match self {
            RequestBody::Bytes(bytes) => Ok(bytes),
            RequestBody::Stream(stream) => collect_stream(stream).await,
        }
    }
}

/// A single request as seen by the network layer
#[derive(Debug)]
pub struct TransportRequest {
    /// Method
    pub method: Method,
    /// Fully composed URL
    pub url: String,
    /// Headers
    pub headers: HeaderMap,
    /// Body
    pub body: Option<RequestBody>,
    /// Stream transmission mode
    pub duplex: Option<Duplex>,
}

/// Body of a transport response
pub enum ResponseBody {
    /// The response has no body
    Empty,
    /// Body already in memory
    Full(Bytes),
    /// Body still on the wire
    Stream(BodyStream),
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl ResponseBody {
    /// Whether the response carries no body at all
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }

    /// Read the whole body
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        match self {
            ResponseBody::Empty => Ok(Bytes::new()),
            ResponseBody::Full(bytes) => Ok(bytes),
            ResponseBody::Stream(stream) => collect_stream(stream).await,
        }
    }

    /// Read the whole body as UTF-8, replacing invalid sequences
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The body as a stream, without reading it
    pub fn into_stream(self) -> BodyStream {
        match self {
            ResponseBody::Empty => Box::pin(futures::stream::empty()),
            ResponseBody::Full(bytes) => Box::pin(futures::stream::once(async move { Ok(bytes) })),
            ResponseBody::Stream(stream) => stream,
        }
    }
}

async fn collect_stream(stream: BodyStream) -> Result<Bytes, TransportError> {
    let buffer = stream
        .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;
    Ok(buffer.freeze())
}

/// Response as returned by the network layer
#[derive(Debug)]
pub struct TransportResponse {
    /// Status
    pub status: StatusCode,
    /// Headers
    pub headers: HeaderMap,
    /// Final URL after redirects, when known
    pub url: Option<String>,
    /// Body
    pub body: ResponseBody,
}

impl TransportResponse {
    /// Response with an in-memory body
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            url: None,
            body: ResponseBody::Full(body.into()),
        }
    }

    /// Response without a body
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: None,
            body: ResponseBody::Empty,
        }
    }
}

/// Performs one network round trip
///
/// The pipeline owns retries, timeouts and decoding; a transport only sends
/// the request and hands back status, headers and the body.
#[async_trait::async_trait]
pub trait Transport: Debug + Send + Sync {
    /// Send `request`
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
