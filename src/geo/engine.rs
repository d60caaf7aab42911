//! Aggregation engine: queries providers for one target and merges their
//! canonical results.
//!
//! Run flow:  reset → plan (cap, exclusions, URLs) → fetch + parse per
//! provider → Done. With `FailurePolicy::Isolate` providers run concurrently
//! and a transport failure only affects its own provider. With
//! `FailurePolicy::AbortRun` providers run one by one in registry order and
//! the first transport failure ends the run.

use super::parser::parse_response;
use super::providers::{Language, LanguageSelector, Provider, ProviderRef, Registry};
use super::record::{CanonicalRecord, ProviderSlots};
use super::request::{build_url, redact};
use super::resolver::{self, FromFieldValue, Resolved};
use super::transport::{HttpTransport, Transport};
use super::types::{ConfigError, ErrorCode, Field, FieldValue, ProviderError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What a transport failure does to the rest of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure for that provider and keep querying the others.
    #[default]
    #[serde(rename = "isolate")]
    Isolate,
    /// Stop at the first transport failure; later providers are not tried.
    #[serde(rename = "abort")]
    AbortRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Done,
}

/// How the most recent run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RunOutcome {
    NotRun,
    Completed,
    Aborted { provider: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub attempted: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Caller-owned query settings; read-only during a run.
#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    /// Target IP or hostname. Empty means the caller's own address.
    pub host: String,
    pub language: Option<Language>,
    /// How many providers to try. 0 or more than registered means all.
    pub provider_cap: usize,
    /// Registry positions never queried.
    pub excluded: BTreeSet<usize>,
    /// Registry position → API key.
    pub api_keys: HashMap<usize, String>,
    pub on_transport_error: FailurePolicy,
}

struct Job {
    position: usize,
    url: String,
}

struct Outcome {
    position: usize,
    slots: ProviderSlots,
    error: ProviderError,
}

/// The aggregation engine. One instance owns one canonical record.
pub struct Aggregator<T: Transport = HttpTransport> {
    registry: Arc<Registry>,
    transport: Arc<T>,
    config: QueryConfig,
    record: CanonicalRecord,
    errors: Vec<ProviderError>,
    attempted: Vec<usize>,
    state: RunState,
    outcome: RunOutcome,
}

impl Aggregator<HttpTransport> {
    /// Built-in providers over HTTP with the given timeout.
    pub fn builtin(timeout: Duration) -> Self {
        Self::new(Arc::new(Registry::builtin()), Arc::new(HttpTransport::new(timeout)))
    }
}

impl<T: Transport> Aggregator<T> {
    pub fn new(registry: Arc<Registry>, transport: Arc<T>) -> Self {
        let count = registry.len();
        Self {
            registry,
            transport,
            config: QueryConfig::default(),
            record: CanonicalRecord::new(count),
            errors: vec![ProviderError::none(); count],
            attempted: Vec::new(),
            state: RunState::Idle,
            outcome: RunOutcome::NotRun,
        }
    }

    // ─── Configuration ──────────────────────────────────────────

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.config.host = host.into();
    }

    /// Select the response language by name, provider code, or id.
    ///
    /// An unknown selector clears the language, so providers answer in their
    /// default, and is reported back as an error.
    pub fn set_language(&mut self, selector: impl Into<LanguageSelector>) -> Result<(), ConfigError> {
        let selector = selector.into();
        self.config.language = self.registry.resolve_language(&selector);
        match self.config.language {
            Some(_) => Ok(()),
            None => Err(ConfigError::UnknownLanguage(match selector {
                LanguageSelector::Name(n) => n,
                LanguageSelector::Id(id) => id.to_string(),
            })),
        }
    }

    pub fn set_provider_cap(&mut self, cap: usize) {
        self.config.provider_cap = cap;
    }

    pub fn set_failure_policy(&mut self, policy: FailurePolicy) {
        self.config.on_transport_error = policy;
    }

    pub fn exclude<'a>(&mut self, provider: impl Into<ProviderRef<'a>>) -> Result<(), ConfigError> {
        let position = self.position_of(provider.into())?;
        self.config.excluded.insert(position);
        Ok(())
    }

    pub fn exclude_all<'a, I, R>(&mut self, providers: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = R>,
        R: Into<ProviderRef<'a>>,
    {
        providers.into_iter().try_for_each(|p| self.exclude(p))
    }

    pub fn set_api_key<'a>(&mut self, provider: impl Into<ProviderRef<'a>>, key: impl Into<String>) -> Result<(), ConfigError> {
        let position = self.position_of(provider.into())?;
        self.config.api_keys.insert(position, key.into());
        Ok(())
    }

    pub fn set_api_keys<'a, I, R, K>(&mut self, keys: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (R, K)>,
        R: Into<ProviderRef<'a>>,
        K: Into<String>,
    {
        keys.into_iter().try_for_each(|(p, k)| self.set_api_key(p, k))
    }

    fn position_of(&self, provider: ProviderRef<'_>) -> Result<usize, ConfigError> {
        if matches!(provider, ProviderRef::Name(n) if n.trim().is_empty()) {
            return Err(ConfigError::EmptyProvider);
        }
        self.registry
            .position(provider)
            .ok_or_else(|| ConfigError::UnsupportedProvider(provider.to_string()))
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of providers a run will consider, before exclusions.
    pub fn effective_provider_count(&self) -> usize {
        let total = self.registry.len();
        match self.config.provider_cap {
            0 => total,
            cap => cap.min(total),
        }
    }

    // ─── Execution ──────────────────────────────────────────────

    /// Run against every selected provider and wait for all of them.
    ///
    /// Under the default `FailurePolicy::Isolate` a transport failure only
    /// marks its own provider and the run goes on. Set
    /// `FailurePolicy::AbortRun` to stop at the first transport failure.
    pub async fn run(&mut self) -> RunSummary {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like `run`, but stop waiting as soon as `cancel` completes. Providers
    /// still in flight are recorded as cancelled; whatever was already
    /// parsed stays queryable.
    pub async fn run_until<F>(&mut self, cancel: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        self.record.clear();
        self.errors.iter_mut().for_each(|e| *e = ProviderError::none());
        self.attempted.clear();
        self.state = RunState::Running;

        let jobs = self.plan();
        let outcome = match self.config.on_transport_error {
            FailurePolicy::Isolate => self.fan_out(jobs, cancel).await,
            FailurePolicy::AbortRun => self.sequential(jobs, cancel).await,
        };

        self.state = RunState::Done;
        self.outcome = outcome.clone();

        let summary = RunSummary {
            outcome,
            attempted: self.attempted.len(),
            failed: self.error_count(),
            elapsed: started.elapsed(),
        };
        info!(
            host = %self.config.host,
            attempted = summary.attempted,
            failed = summary.failed,
            outcome = ?summary.outcome,
            "lookup finished in {:.1}ms",
            summary.elapsed.as_secs_f64() * 1000.0
        );
        summary
    }

    fn plan(&self) -> Vec<Job> {
        let mut jobs = Vec::new();
        for position in 0..self.effective_provider_count() {
            let provider = &self.registry.providers()[position];
            if self.config.excluded.contains(&position) {
                debug!(provider = provider.name, "skipping excluded provider");
                continue;
            }
            let key = self.config.api_keys.get(&position).map_or("", String::as_str);
            let url = build_url(provider, &self.config.host, self.config.language, key);
            debug!(provider = provider.name, url = %redact(&url, provider), "request planned");
            jobs.push(Job { position, url });
        }
        jobs
    }

    async fn fan_out<F>(&mut self, jobs: Vec<Job>, cancel: F) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        let mut pending: BTreeSet<usize> = BTreeSet::new();
        let mut tasks = JoinSet::new();
        for job in jobs {
            pending.insert(job.position);
            self.attempted.push(job.position);
            let provider = self.registry.providers()[job.position].clone();
            tasks.spawn(query_provider(Arc::clone(&self.transport), provider, job));
        }

        tokio::pin!(cancel);
        loop {
            tokio::select! {
                biased;
                () = &mut cancel => {
                    tasks.abort_all();
                    for position in std::mem::take(&mut pending) {
                        self.errors[position] = ProviderError::new(ErrorCode::Cancelled, "run cancelled before the provider answered");
                    }
                    warn!("lookup cancelled with providers still in flight");
                    return RunOutcome::Cancelled;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => {
                        pending.remove(&outcome.position);
                        self.apply(outcome);
                    }
                    Some(Err(e)) => warn!("provider task ended abnormally: {}", e),
                    None => break,
                },
            }
        }

        for position in pending {
            self.errors[position] = ProviderError::new(ErrorCode::Transport, "provider task did not complete");
        }
        RunOutcome::Completed
    }

    async fn sequential<F>(&mut self, jobs: Vec<Job>, cancel: F) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        for job in jobs {
            let position = job.position;
            self.attempted.push(position);
            let provider = self.registry.providers()[position].clone();
            let query = query_provider(Arc::clone(&self.transport), provider, job);

            let outcome = tokio::select! {
                biased;
                () = &mut cancel => {
                    self.errors[position] = ProviderError::new(ErrorCode::Cancelled, "run cancelled before the provider answered");
                    warn!("lookup cancelled");
                    return RunOutcome::Cancelled;
                }
                outcome = query => outcome,
            };

            let transport_failed = outcome.error.code == ErrorCode::Transport;
            self.apply(outcome);
            if transport_failed {
                let name = self.registry.providers()[position].name.to_string();
                warn!(provider = %name, "transport failure, remaining providers skipped");
                return RunOutcome::Aborted { provider: name };
            }
        }
        RunOutcome::Completed
    }

    fn apply(&mut self, outcome: Outcome) {
        let name = self.registry.providers()[outcome.position].name;
        if outcome.error.is_error() {
            warn!(provider = name, error = %outcome.error, "provider failed");
        } else {
            debug!(provider = name, parsed = outcome.slots.parsed_count(), "provider answered");
        }
        self.record.store(outcome.position, outcome.slots);
        self.errors[outcome.position] = outcome.error;
    }

    // ─── Queries ────────────────────────────────────────────────

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    pub fn record(&self) -> &CanonicalRecord {
        &self.record
    }

    /// Registry positions queried by the most recent run.
    pub fn attempted(&self) -> &[usize] {
        &self.attempted
    }

    /// Resolve a field across providers by priority.
    pub fn resolve<V: FromFieldValue>(&self, field: Field) -> Resolved<V> {
        resolver::resolve(&self.record, &self.registry, field)
    }

    pub fn resolve_value(&self, field: Field) -> Resolved<FieldValue> {
        resolver::resolve_value(&self.record, &self.registry, field)
    }

    /// Value only; `None` when no provider supplied the field.
    pub fn get<V: FromFieldValue>(&self, field: Field) -> Option<V> {
        self.resolve(field).value
    }

    /// Providers attempted in the most recent run whose last outcome is an error.
    pub fn error_count(&self) -> usize {
        self.attempted.iter().filter(|p| self.errors[**p].is_error()).count()
    }

    /// Last outcome for one provider. Configuration mistakes (empty name,
    /// unknown provider, excluded provider) get their own codes.
    pub fn last_error<'a>(&self, provider: impl Into<ProviderRef<'a>>) -> ProviderError {
        let provider = provider.into();
        match self.position_of(provider) {
            Err(ConfigError::EmptyProvider) => ProviderError::new(ErrorCode::EmptyHost, "empty provider identifier"),
            Err(_) => ProviderError::new(
                ErrorCode::UnsupportedProvider,
                format!("provider '{}' is not supported", provider),
            ),
            Ok(position) if self.config.excluded.contains(&position) => ProviderError::new(
                ErrorCode::ExcludedProvider,
                format!("provider '{}' is excluded", self.registry.providers()[position].name),
            ),
            Ok(position) => self.errors[position].clone(),
        }
    }

    /// Every provider with its last recorded outcome, in priority order.
    pub fn provider_errors(&self) -> impl Iterator<Item = (&Provider, &ProviderError)> {
        self.registry.providers().iter().zip(self.errors.iter())
    }
}

async fn query_provider<T: Transport>(transport: Arc<T>, provider: Provider, job: Job) -> Outcome {
    let Job { position, url } = job;
    let fetched = tokio::task::spawn_blocking(move || transport.fetch(&url)).await;

    let reason = match fetched {
        Ok(Ok(body)) => {
            let parsed = parse_response(&provider, &body);
            return Outcome {
                position,
                slots: parsed.slots,
                error: parsed.error,
            };
        }
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("transport task failed: {}", e),
    };

    Outcome {
        position,
        slots: ProviderSlots::for_provider(&provider, &format!("request failed: {}", reason)),
        error: ProviderError::new(ErrorCode::Transport, reason),
    }
}

// ─── Named accessors ────────────────────────────────────────────

macro_rules! field_accessors {
    ($($field:ident => $plain:ident, $ex:ident: $ty:ty;)*) => {
        impl<T: Transport> Aggregator<T> {
            $(
                #[doc = concat!("Resolved `", stringify!($plain), "`, if any provider supplied it.")]
                pub fn $plain(&self) -> Option<$ty> {
                    self.get(Field::$field)
                }

                #[doc = concat!("`", stringify!($plain), "` with its source provider and description.")]
                pub fn $ex(&self) -> Resolved<$ty> {
                    self.resolve(Field::$field)
                }
            )*
        }
    };
}

field_accessors! {
    Ip => ip, ip_ex: String;
    IpType => ip_type, ip_type_ex: String;
    Continent => continent, continent_ex: String;
    ContinentCode => continent_code, continent_code_ex: String;
    Country => country, country_ex: String;
    CountryCode => country_code, country_code_ex: String;
    CountryCapital => country_capital, country_capital_ex: String;
    CountryPhoneCode => country_phone_code, country_phone_code_ex: String;
    CountryNeighbors => country_neighbors, country_neighbors_ex: String;
    Region => region, region_ex: String;
    RegionCode => region_code, region_code_ex: String;
    City => city, city_ex: String;
    District => district, district_ex: String;
    ZipCode => zip_code, zip_code_ex: String;
    Latitude => latitude, latitude_ex: f64;
    Longitude => longitude, longitude_ex: f64;
    Timezone => timezone, timezone_ex: String;
    TimezoneName => timezone_name, timezone_name_ex: String;
    TimezoneGmt => timezone_gmt, timezone_gmt_ex: String;
    GmtOffset => gmt_offset, gmt_offset_ex: i64;
    DstOffset => dst_offset, dst_offset_ex: i64;
    Isp => isp, isp_ex: String;
    Org => org, org_ex: String;
    Asn => asn, asn_ex: String;
    AsName => as_name, as_name_ex: String;
    ReverseDns => reverse_dns, reverse_dns_ex: String;
    Mobile => is_mobile, is_mobile_ex: bool;
    Proxy => is_proxy, is_proxy_ex: bool;
    Hosting => is_hosting, is_hosting_ex: bool;
    Currency => currency, currency_ex: String;
    CurrencyCode => currency_code, currency_code_ex: String;
    CurrencySymbol => currency_symbol, currency_symbol_ex: String;
    CurrencyRates => currency_rates, currency_rates_ex: f64;
    CurrencyPlural => currency_plural, currency_plural_ex: String;
}
