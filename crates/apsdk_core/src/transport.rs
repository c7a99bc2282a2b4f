//! Transport layer abstraction.

use crate::error::{SdkError, SdkResult};
use crate::request::ApiRequest;
use apsdk_protocol::{JsonSerializer, ResponseEnvelope, Serializer};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Executes requests against the platform.
///
/// Implementations own the network. The request body is already serialized;
/// the returned bytes are the raw response envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the response body.
    async fn send(&self, request: &ApiRequest) -> SdkResult<Vec<u8>>;
}

/// A transport that replays queued responses, for tests.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<SdkResult<Vec<u8>>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    /// Creates a mock transport with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw response bytes.
    pub fn push_bytes(&self, bytes: Vec<u8>) {
        self.responses.lock().push_back(Ok(bytes));
    }

    /// Queues a response envelope encoded as JSON.
    pub fn push_envelope(&self, envelope: &ResponseEnvelope) {
        let bytes = JsonSerializer
            .encode_envelope(envelope)
            .map_err(SdkError::from);
        self.responses.lock().push_back(bytes);
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: SdkError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> SdkResult<Vec<u8>> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SdkError::transport_fatal("no mock response queued")))
    }
}
