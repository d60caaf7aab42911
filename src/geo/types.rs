//! Core types for the geolocation subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The shape of value a canonical field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Float,
    Integer,
    Flag,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Float => write!(f, "float"),
            Self::Integer => write!(f, "integer"),
            Self::Flag => write!(f, "flag"),
        }
    }
}

// ─── Canonical fields ───────────────────────────────────────────

/// A provider-agnostic data attribute. Every provider's raw schema is mapped
/// onto this set, so field identity is stable across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Ip,
    IpType,
    Continent,
    ContinentCode,
    Country,
    CountryCode,
    CountryCapital,
    CountryPhoneCode,
    CountryNeighbors,
    Region,
    RegionCode,
    City,
    District,
    ZipCode,
    Latitude,
    Longitude,
    Timezone,
    TimezoneName,
    TimezoneGmt,
    GmtOffset,
    DstOffset,
    Isp,
    Org,
    Asn,
    AsName,
    ReverseDns,
    Mobile,
    Proxy,
    Hosting,
    Currency,
    CurrencyCode,
    CurrencySymbol,
    CurrencyRates,
    CurrencyPlural,
}

impl Field {
    pub const ALL: [Field; 34] = [
        Field::Ip,
        Field::IpType,
        Field::Continent,
        Field::ContinentCode,
        Field::Country,
        Field::CountryCode,
        Field::CountryCapital,
        Field::CountryPhoneCode,
        Field::CountryNeighbors,
        Field::Region,
        Field::RegionCode,
        Field::City,
        Field::District,
        Field::ZipCode,
        Field::Latitude,
        Field::Longitude,
        Field::Timezone,
        Field::TimezoneName,
        Field::TimezoneGmt,
        Field::GmtOffset,
        Field::DstOffset,
        Field::Isp,
        Field::Org,
        Field::Asn,
        Field::AsName,
        Field::ReverseDns,
        Field::Mobile,
        Field::Proxy,
        Field::Hosting,
        Field::Currency,
        Field::CurrencyCode,
        Field::CurrencySymbol,
        Field::CurrencyRates,
        Field::CurrencyPlural,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::IpType => "ip_type",
            Self::Continent => "continent",
            Self::ContinentCode => "continent_code",
            Self::Country => "country",
            Self::CountryCode => "country_code",
            Self::CountryCapital => "country_capital",
            Self::CountryPhoneCode => "country_phone_code",
            Self::CountryNeighbors => "country_neighbors",
            Self::Region => "region",
            Self::RegionCode => "region_code",
            Self::City => "city",
            Self::District => "district",
            Self::ZipCode => "zip_code",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Timezone => "timezone",
            Self::TimezoneName => "timezone_name",
            Self::TimezoneGmt => "timezone_gmt",
            Self::GmtOffset => "gmt_offset",
            Self::DstOffset => "dst_offset",
            Self::Isp => "isp",
            Self::Org => "org",
            Self::Asn => "asn",
            Self::AsName => "as_name",
            Self::ReverseDns => "reverse_dns",
            Self::Mobile => "mobile",
            Self::Proxy => "proxy",
            Self::Hosting => "hosting",
            Self::Currency => "currency",
            Self::CurrencyCode => "currency_code",
            Self::CurrencySymbol => "currency_symbol",
            Self::CurrencyRates => "currency_rates",
            Self::CurrencyPlural => "currency_plural",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Self::Latitude | Self::Longitude | Self::CurrencyRates => ValueKind::Float,
            Self::GmtOffset | Self::DstOffset => ValueKind::Integer,
            Self::Mobile | Self::Proxy | Self::Hosting => ValueKind::Flag,
            _ => ValueKind::Text,
        }
    }

    /// Decimal places applied when the field is resolved. Stored values keep
    /// the precision the provider sent.
    pub fn precision(self) -> Option<u32> {
        match self {
            Self::Latitude | Self::Longitude => Some(2),
            _ => None,
        }
    }

    /// Static human-readable description of the field.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ip => "IP address the lookup was answered for",
            Self::IpType => "IP version (IPv4 or IPv6)",
            Self::Continent => "Continent name",
            Self::ContinentCode => "Two-letter continent code",
            Self::Country => "Country name",
            Self::CountryCode => "ISO 3166-1 alpha-2 country code",
            Self::CountryCapital => "Capital of the country",
            Self::CountryPhoneCode => "International dialing prefix of the country",
            Self::CountryNeighbors => "Comma-separated codes of neighboring countries",
            Self::Region => "Region, state or province name",
            Self::RegionCode => "Region, state or province short code",
            Self::City => "City name",
            Self::District => "District or subdivision of the city",
            Self::ZipCode => "Postal code",
            Self::Latitude => "Latitude in degrees",
            Self::Longitude => "Longitude in degrees",
            Self::Timezone => "IANA timezone identifier",
            Self::TimezoneName => "Long timezone name",
            Self::TimezoneGmt => "Timezone offset as a GMT label",
            Self::GmtOffset => "UTC offset in seconds",
            Self::DstOffset => "Daylight saving offset in seconds",
            Self::Isp => "Internet service provider",
            Self::Org => "Organization that owns the address",
            Self::Asn => "Autonomous system number and name",
            Self::AsName => "Autonomous system name",
            Self::ReverseDns => "Reverse DNS name of the address",
            Self::Mobile => "Whether the address belongs to a mobile network",
            Self::Proxy => "Whether the address is a proxy, VPN or Tor exit",
            Self::Hosting => "Whether the address belongs to a hosting provider",
            Self::Currency => "Local currency name",
            Self::CurrencyCode => "ISO 4217 currency code",
            Self::CurrencySymbol => "Local currency symbol",
            Self::CurrencyRates => "Exchange rate of the local currency against USD",
            Self::CurrencyPlural => "Plural name of the local currency",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownField(s.to_string()))
    }
}

/// A parsed value held in a field slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Float(f64),
    Integer(i64),
    Flag(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Float(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Flag(v) => write!(f, "{}", if *v { "yes" } else { "no" }),
        }
    }
}

// ─── Provider-scoped outcomes ───────────────────────────────────

/// Outcome category recorded for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NoError,
    EmptyHost,
    UnsupportedProvider,
    ExcludedProvider,
    Transport,
    Parse,
    Cancelled,
}

/// The last outcome observed for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderError {
    pub code: ErrorCode,
    pub description: String,
}

impl ProviderError {
    pub fn none() -> Self {
        Self {
            code: ErrorCode::NoError,
            description: String::new(),
        }
    }

    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code != ErrorCode::NoError
    }
}

impl Default for ProviderError {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{:?}", self.code)
        } else {
            write!(f, "{:?}: {}", self.code, self.description)
        }
    }
}

/// Failure of the network call for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Configuration mistakes, detected synchronously.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("provider '{0}' is not supported")]
    UnsupportedProvider(String),
    #[error("empty provider identifier")]
    EmptyProvider,
    #[error("unknown language '{0}'")]
    UnknownLanguage(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("malformed API key entry '{0}', expected PROVIDER=KEY")]
    MalformedKey(String),
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
