//! HTTP implementation of [`super::ParticipantSource`] backed by `reqwest`.

mod config;
mod error;
mod source;

pub use config::HttpSourceConfig;
pub use error::{HttpSourceError, HttpSourceResult};
pub use source::HttpParticipantSource;
