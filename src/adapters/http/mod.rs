mod client;

pub use client::ReqwestTransport;
