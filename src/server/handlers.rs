use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::geo::{Aggregator, ConfigError, Field, FieldValue, ProviderRef, Report, Resolved, Transport, ValueKind};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        let status = match e {
            ConfigError::Io(_) | ConfigError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError(status, e.to_string())
    }
}

// ─── Shared query handling ───────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub ip: Option<String>,
    pub lang: Option<String>,
    pub providers: Option<usize>,
    /// Comma-separated provider names or ids.
    pub exclude: Option<String>,
}

fn prepare<T: Transport>(state: &AppState<T>, params: &LookupQuery) -> Result<Aggregator<T>, ApiError> {
    let mut agg = state.engine()?;
    agg.set_host(params.ip.as_deref().unwrap_or("").trim());

    if let Some(lang) = params.lang.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        let applied = match lang.parse::<u8>() {
            Ok(id) => agg.set_language(id),
            Err(_) => agg.set_language(lang),
        };
        applied?;
    }
    if let Some(cap) = params.providers {
        agg.set_provider_cap(cap);
    }
    if let Some(list) = params.exclude.as_deref() {
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            agg.exclude(ProviderRef::parse(name))?;
        }
    }
    Ok(agg)
}

// ─── GET /api/lookup ─────────────────────────────────────────────

pub async fn lookup<T: Transport>(
    State(state): State<Arc<AppState<T>>>,
    Query(params): Query<LookupQuery>,
) -> Result<Json<Report>, ApiError> {
    let start = Instant::now();
    let mut agg = prepare(&state, &params)?;
    let summary = agg.run().await;
    let report = agg.report();

    info!(
        target_ip = %report.target,
        failed = summary.failed,
        "GET /api/lookup ({:.1}ms)",
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(Json(report))
}

// ─── GET /api/field ──────────────────────────────────────────────

/// Same parameters as `/api/lookup` plus the field `name`. Kept flat:
/// urlencoded numbers do not survive `#[serde(flatten)]`.
#[derive(Debug, Default, Deserialize)]
pub struct FieldQuery {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub lang: Option<String>,
    pub providers: Option<usize>,
    pub exclude: Option<String>,
}

impl FieldQuery {
    fn lookup(self) -> LookupQuery {
        LookupQuery {
            ip: self.ip,
            lang: self.lang,
            providers: self.providers,
            exclude: self.exclude,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldResponse {
    pub field: Field,
    pub kind: ValueKind,
    #[serde(flatten)]
    pub result: Resolved<FieldValue>,
}

pub async fn field<T: Transport>(
    State(state): State<Arc<AppState<T>>>,
    Query(params): Query<FieldQuery>,
) -> Result<Json<FieldResponse>, ApiError> {
    let name = params.name.as_deref().unwrap_or("").trim();
    if name.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Missing 'name' parameter".to_string()));
    }
    let field: Field = name.parse()?;

    let mut agg = prepare(&state, &params.lookup())?;
    agg.run().await;
    let result = agg.resolve_value(field);

    info!(field = field.name(), resolved = result.resolved, "GET /api/field");
    Ok(Json(FieldResponse {
        field,
        kind: field.kind(),
        result,
    }))
}

// ─── GET /api/providers ──────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub id: u8,
    pub name: &'static str,
    pub base_url: &'static str,
    pub languages: Vec<&'static str>,
    pub fields: Vec<Field>,
}

pub async fn providers<T: Transport>(State(state): State<Arc<AppState<T>>>) -> Json<Vec<ProviderInfo>> {
    let list = state
        .registry
        .providers()
        .iter()
        .map(|p| ProviderInfo {
            id: p.id,
            name: p.name,
            base_url: p.base_url,
            languages: p.languages.iter().map(|(_, code)| *code).collect(),
            fields: Field::ALL.iter().copied().filter(|f| p.supports(*f)).collect(),
        })
        .collect();
    Json(list)
}
