pub mod document;
pub mod error;
pub mod place;
pub mod query;

pub use document::{Document, DocumentId, Filter, RetentionPolicy, StoredDocument, Update};
pub use error::{
    classify, parse_body, ApiError, ApiErrorKind, StoreError, TransportError, ValidationError,
};
pub use place::Place;
pub use query::{
    Coordinates, Granularity, Location, RequestDescriptor, ReverseGeocodeQuery, TimeWindow,
};
