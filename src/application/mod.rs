pub mod gateway;
pub mod normalizer;
pub mod store;

pub use gateway::{ApiGateway, GeocodingGateway, WeatherGateway};
pub use normalizer::QueryNormalizer;
pub use store::RetentionStore;
