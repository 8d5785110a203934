use async_trait::async_trait;

use crate::domain::TransportError;

/// A completed HTTP exchange: status code and raw body bytes
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Port for issuing outbound GET requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a GET to `url` with the given query pairs (URL-encoded by the transport)
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TransportError>;
}
