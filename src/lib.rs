//! Typed gateway for OpenWeather-style history and reverse geocoding APIs,
//! plus a document store that caps each collection at a fixed size by
//! evicting the oldest documents.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{ApiGateway, GeocodingGateway, QueryNormalizer, RetentionStore, WeatherGateway};
pub use config::{ApiEndpoint, Config, ConfigError};
pub use domain::{
    ApiError, ApiErrorKind, Coordinates, Document, DocumentId, Filter, Granularity, Location, Place,
    RequestDescriptor, RetentionPolicy, ReverseGeocodeQuery, StoreError, StoredDocument, TimeWindow,
    TransportError, Update, ValidationError,
};
