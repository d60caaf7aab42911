//! Provider catalog: ip-api.com and ipwhois.app, their languages and
//! raw-key mappings onto the canonical field set.
//!
//! The order of `Registry::builtin()` is priority order. The first provider
//! that parsed a field wins during resolution.

use super::types::Field;
use serde::Serialize;
use std::fmt;

// ─── Languages ──────────────────────────────────────────────────

/// Response languages understood by at least one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    German,
    Spanish,
    Portuguese,
    French,
    Japanese,
    Chinese,
    Russian,
}

impl Language {
    /// Indexed by language id.
    pub const ALL: [Language; 8] = [
        Language::English,
        Language::German,
        Language::Spanish,
        Language::Portuguese,
        Language::French,
        Language::Japanese,
        Language::Chinese,
        Language::Russian,
    ];

    pub fn id(self) -> u8 {
        match self {
            Self::English => 0,
            Self::German => 1,
            Self::Spanish => 2,
            Self::Portuguese => 3,
            Self::French => 4,
            Self::Japanese => 5,
            Self::Chinese => 6,
            Self::Russian => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::English => "english",
            Self::German => "german",
            Self::Spanish => "spanish",
            Self::Portuguese => "portuguese",
            Self::French => "french",
            Self::Japanese => "japanese",
            Self::Chinese => "chinese",
            Self::Russian => "russian",
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let n = name.trim().to_lowercase();
        Self::ALL.iter().copied().find(|l| l.name() == n)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a caller names a language: symbolic name / provider code, or numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSelector {
    Name(String),
    Id(u8),
}

impl From<&str> for LanguageSelector {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<String> for LanguageSelector {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

impl From<u8> for LanguageSelector {
    fn from(id: u8) -> Self {
        Self::Id(id)
    }
}

// ─── Provider description ───────────────────────────────────────

/// How a provider reports success inside an HTTP 200 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    /// `key` must hold the string `ok`.
    Equals { key: &'static str, ok: &'static str },
    /// `key` must hold a truthy value.
    Truthy { key: &'static str },
}

impl StatusCheck {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Equals { key, .. } | Self::Truthy { key } => *key,
        }
    }
}

/// One third-party geolocation API integration. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub id: u8,
    pub name: &'static str,
    /// Request path prefix; the IP/host segment is appended directly.
    pub base_url: &'static str,
    /// Query parameter naming the selected fields (`fields`, `objects`).
    pub fields_param: &'static str,
    pub lang_param: &'static str,
    pub key_param: &'static str,
    pub status: Option<StatusCheck>,
    pub message_key: Option<&'static str>,
    pub languages: &'static [(Language, &'static str)],
    /// Canonical field → raw JSON key, in canonical order.
    pub fields: &'static [(Field, &'static str)],
}

impl Provider {
    pub fn raw_key(&self, field: Field) -> Option<&'static str> {
        self.fields.iter().find(|(f, _)| *f == field).map(|(_, k)| *k)
    }

    pub fn supports(&self, field: Field) -> bool {
        self.raw_key(field).is_some()
    }

    pub fn language_code(&self, language: Language) -> Option<&'static str> {
        self.languages
            .iter()
            .find(|(l, _)| *l == language)
            .map(|(_, code)| *code)
    }
}

const COMMON_LANGUAGES: &[(Language, &str)] = &[
    (Language::English, "en"),
    (Language::German, "de"),
    (Language::Spanish, "es"),
    (Language::Portuguese, "pt-BR"),
    (Language::French, "fr"),
    (Language::Japanese, "ja"),
    (Language::Chinese, "zh-CN"),
    (Language::Russian, "ru"),
];

pub const IP_API_COM: Provider = Provider {
    id: 0,
    name: "ip-api.com",
    base_url: "http://ip-api.com/json/",
    fields_param: "fields",
    lang_param: "lang",
    key_param: "key",
    status: Some(StatusCheck::Equals { key: "status", ok: "success" }),
    message_key: Some("message"),
    languages: COMMON_LANGUAGES,
    fields: &[
        (Field::Ip, "query"),
        (Field::Continent, "continent"),
        (Field::ContinentCode, "continentCode"),
        (Field::Country, "country"),
        (Field::CountryCode, "countryCode"),
        (Field::Region, "regionName"),
        (Field::RegionCode, "region"),
        (Field::City, "city"),
        (Field::District, "district"),
        (Field::ZipCode, "zip"),
        (Field::Latitude, "lat"),
        (Field::Longitude, "lon"),
        (Field::Timezone, "timezone"),
        (Field::GmtOffset, "offset"),
        (Field::Isp, "isp"),
        (Field::Org, "org"),
        (Field::Asn, "as"),
        (Field::AsName, "asname"),
        (Field::ReverseDns, "reverse"),
        (Field::Mobile, "mobile"),
        (Field::Proxy, "proxy"),
        (Field::Hosting, "hosting"),
        (Field::CurrencyCode, "currency"),
    ],
};

pub const IPWHOIS_APP: Provider = Provider {
    id: 1,
    name: "ipwhois.app",
    base_url: "http://ipwhois.app/json/",
    fields_param: "objects",
    lang_param: "lang",
    key_param: "key",
    status: Some(StatusCheck::Truthy { key: "success" }),
    message_key: Some("message"),
    languages: COMMON_LANGUAGES,
    fields: &[
        (Field::Ip, "ip"),
        (Field::IpType, "type"),
        (Field::Continent, "continent"),
        (Field::ContinentCode, "continent_code"),
        (Field::Country, "country"),
        (Field::CountryCode, "country_code"),
        (Field::CountryCapital, "country_capital"),
        (Field::CountryPhoneCode, "country_phone"),
        (Field::CountryNeighbors, "country_neighbours"),
        (Field::Region, "region"),
        (Field::City, "city"),
        (Field::Latitude, "latitude"),
        (Field::Longitude, "longitude"),
        (Field::Timezone, "timezone"),
        (Field::TimezoneName, "timezone_name"),
        (Field::TimezoneGmt, "timezone_gmt"),
        (Field::GmtOffset, "timezone_gmtOffset"),
        (Field::DstOffset, "timezone_dstOffset"),
        (Field::Isp, "isp"),
        (Field::Org, "org"),
        (Field::Asn, "asn"),
        (Field::Currency, "currency"),
        (Field::CurrencyCode, "currency_code"),
        (Field::CurrencySymbol, "currency_symbol"),
        (Field::CurrencyRates, "currency_rates"),
        (Field::CurrencyPlural, "currency_plural"),
    ],
};

// ─── Registry ───────────────────────────────────────────────────

/// A provider named by caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRef<'a> {
    Name(&'a str),
    Id(u8),
}

impl<'a> From<&'a str> for ProviderRef<'a> {
    fn from(s: &'a str) -> Self {
        Self::Name(s)
    }
}

impl<'a> From<&'a String> for ProviderRef<'a> {
    fn from(s: &'a String) -> Self {
        Self::Name(s.as_str())
    }
}

impl From<u8> for ProviderRef<'_> {
    fn from(id: u8) -> Self {
        Self::Id(id)
    }
}

impl<'a> ProviderRef<'a> {
    /// Interpret user text: a bare number is an id, anything else a name.
    pub fn parse(s: &'a str) -> Self {
        match s.trim().parse::<u8>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(s.trim()),
        }
    }
}

impl fmt::Display for ProviderRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.write_str(n),
            Self::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// Ordered, read-only catalog of providers.
#[derive(Debug, Clone)]
pub struct Registry {
    providers: Vec<Provider>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    pub fn builtin() -> Self {
        Self::new(vec![IP_API_COM, IPWHOIS_APP])
    }

    /// Build a registry from providers listed in priority order.
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Priority position of a provider.
    pub fn position(&self, provider: ProviderRef<'_>) -> Option<usize> {
        match provider {
            ProviderRef::Name(name) => {
                let n = name.trim();
                self.providers.iter().position(|p| p.name.eq_ignore_ascii_case(n))
            }
            ProviderRef::Id(id) => self.providers.iter().position(|p| p.id == id),
        }
    }

    pub fn get(&self, provider: ProviderRef<'_>) -> Option<&Provider> {
        self.position(provider).map(|i| &self.providers[i])
    }

    pub fn is_supported(&self, provider: ProviderRef<'_>) -> bool {
        self.position(provider).is_some()
    }

    /// Provider-specific code for a language name, or `None` when either the
    /// provider or the language is unknown to the catalog.
    pub fn language_code_for(&self, provider: ProviderRef<'_>, language_name: &str) -> Option<&'static str> {
        let provider = self.get(provider)?;
        let language = Language::from_name(language_name)?;
        provider.language_code(language)
    }

    /// Resolve a selector once, at configuration time. Names, ids, and any
    /// provider's language code (`de`, `pt-BR`) are accepted.
    pub fn resolve_language(&self, selector: &LanguageSelector) -> Option<Language> {
        match selector {
            LanguageSelector::Id(id) => Language::from_id(*id),
            LanguageSelector::Name(name) => Language::from_name(name).or_else(|| {
                let code = name.trim();
                self.providers
                    .iter()
                    .flat_map(|p| p.languages.iter())
                    .find(|(_, c)| c.eq_ignore_ascii_case(code))
                    .map(|(l, _)| *l)
            }),
        }
    }
}
