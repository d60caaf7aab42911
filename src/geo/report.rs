//! Serializable snapshot of a finished run, used by the CLI's JSON output and
//! the HTTP API.

use super::engine::{Aggregator, RunOutcome};
use super::providers::Language;
use super::resolver::Resolved;
use super::transport::Transport;
use super::types::{Field, FieldValue, ProviderError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub queried_at: DateTime<Utc>,
    /// Queried address; `"self"` when the caller's own address was looked up.
    pub target: String,
    pub language: Option<Language>,
    pub outcome: RunOutcome,
    /// Every canonical field, keyed by field name.
    pub fields: BTreeMap<Field, Resolved<FieldValue>>,
    pub providers: Vec<ProviderStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: u8,
    pub name: String,
    pub attempted: bool,
    pub excluded: bool,
    pub parsed_fields: usize,
    pub error: ProviderError,
}

impl Report {
    /// Resolved fields only, in canonical order.
    pub fn resolved(&self) -> impl Iterator<Item = (&Field, &Resolved<FieldValue>)> {
        self.fields.iter().filter(|(_, r)| r.resolved)
    }
}

impl<T: Transport> Aggregator<T> {
    pub fn report(&self) -> Report {
        let host = self.config().host.trim();
        let fields = Field::ALL
            .iter()
            .map(|f| (*f, self.resolve_value(*f)))
            .collect();

        let providers = self
            .provider_errors()
            .enumerate()
            .map(|(position, (provider, error))| ProviderStatus {
                id: provider.id,
                name: provider.name.to_string(),
                attempted: self.attempted().contains(&position),
                excluded: self.config().excluded.contains(&position),
                parsed_fields: self.record().provider(position).map_or(0, |s| s.parsed_count()),
                error: error.clone(),
            })
            .collect();

        Report {
            queried_at: Utc::now(),
            target: if host.is_empty() { "self".to_string() } else { host.to_string() },
            language: self.config().language,
            outcome: self.outcome().clone(),
            fields,
            providers,
        }
    }
}
