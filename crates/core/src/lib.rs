pub mod config;
pub mod discount;
pub mod domain;
pub mod errors;
pub mod policy;
pub mod price;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::session::{NegotiationSession, Role, SessionId, SessionState, Turn};
pub use errors::DomainError;
pub use price::{ExtractionMode, PriceExtractor};
