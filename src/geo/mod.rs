//! Multi-provider IP geolocation.
//!
//! Queries every selected provider for one IP address or hostname, maps each
//! response onto a single canonical field set, and resolves each field from
//! the highest-priority provider that supplied it.

pub mod engine;
pub mod parser;
pub mod providers;
pub mod record;
pub mod report;
pub mod request;
pub mod resolver;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Aggregator, FailurePolicy, QueryConfig, RunOutcome, RunState, RunSummary};
pub use providers::{Language, LanguageSelector, Provider, ProviderRef, Registry, IPWHOIS_APP, IP_API_COM};
pub use report::{ProviderStatus, Report};
pub use resolver::{FromFieldValue, Resolved};
pub use transport::{HttpTransport, Transport, DEFAULT_TIMEOUT};
pub use types::{ConfigError, ErrorCode, Field, FieldValue, ProviderError, TransportError, ValueKind};
