//! InfluxDB v2 source: Flux queries over the HTTP query API, CSV responses.

pub mod flux;
pub mod provider;
pub mod response;

pub use provider::{InfluxConfig, InfluxSource};
