pub mod document_engine;
pub mod http_transport;

pub use document_engine::DocumentEngine;
pub use http_transport::{HttpResponse, HttpTransport};
