//! Test fixtures shared across the geo modules: canned bodies, a two-provider
//! registry and a scripted transport that records every URL it is asked for.

use super::providers::{Language, Provider, Registry, StatusCheck};
use super::transport::Transport;
use super::types::{Field, TransportError};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

const LANGS: &[(Language, &str)] = &[(Language::English, "en"), (Language::German, "de")];

pub const ALPHA: Provider = Provider {
    id: 0,
    name: "alpha",
    base_url: "http://alpha.test/json/",
    fields_param: "fields",
    lang_param: "lang",
    key_param: "key",
    status: Some(StatusCheck::Equals { key: "status", ok: "success" }),
    message_key: Some("message"),
    languages: LANGS,
    fields: &[
        (Field::Country, "country"),
        (Field::City, "city"),
        (Field::Latitude, "lat"),
        (Field::Longitude, "lon"),
        (Field::Proxy, "proxy"),
    ],
};

pub const BETA: Provider = Provider {
    id: 1,
    name: "beta",
    base_url: "http://beta.test/json/",
    fields_param: "objects",
    lang_param: "lang",
    key_param: "key",
    status: None,
    message_key: None,
    languages: &[(Language::English, "en")],
    fields: &[
        (Field::Country, "country_name"),
        (Field::City, "city_name"),
        (Field::Latitude, "latitude"),
        (Field::Longitude, "longitude"),
        (Field::Currency, "currency"),
    ],
};

pub fn alpha_beta() -> Registry {
    Registry::new(vec![ALPHA, BETA])
}

pub fn alpha_body() -> Value {
    json!({
        "status": "success",
        "country": "Sweden",
        "city": "Stockholm",
        "lat": 59.329323,
        "lon": 18.068581,
        "proxy": "no"
    })
}

pub fn beta_body() -> Value {
    json!({
        "country_name": "Kingdom of Sweden",
        "city_name": "Solna",
        "latitude": 59.36004,
        "longitude": 18.00086,
        "currency": "Swedish Krona"
    })
}

pub fn ip_api_body() -> Value {
    json!({
        "status": "success",
        "query": "8.8.8.8",
        "continent": "North America",
        "continentCode": "NA",
        "country": "United States",
        "countryCode": "US",
        "region": "VA",
        "regionName": "Virginia",
        "city": "Ashburn",
        "district": "",
        "zip": "20149",
        "lat": 39.03,
        "lon": -77.5,
        "timezone": "America/New_York",
        "offset": -14400,
        "currency": "USD",
        "isp": "Google LLC",
        "org": "Google Public DNS",
        "as": "AS15169 Google LLC",
        "asname": "GOOGLE",
        "reverse": "dns.google",
        "mobile": false,
        "proxy": false,
        "hosting": true
    })
}

/// Answers by URL prefix; unmatched URLs fail with a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Vec<(String, Result<Vec<u8>, TransportError>, Duration)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(self, prefix: &str, body: &Value) -> Self {
        self.route(prefix, Ok(body.to_string().into_bytes()), Duration::ZERO)
    }

    pub fn raw(self, prefix: &str, body: &str) -> Self {
        self.route(prefix, Ok(body.as_bytes().to_vec()), Duration::ZERO)
    }

    pub fn fail(self, prefix: &str, err: TransportError) -> Self {
        self.route(prefix, Err(err), Duration::ZERO)
    }

    pub fn slow(self, prefix: &str, body: &Value, delay: Duration) -> Self {
        self.route(prefix, Ok(body.to_string().into_bytes()), delay)
    }

    fn route(mut self, prefix: &str, answer: Result<Vec<u8>, TransportError>, delay: Duration) -> Self {
        self.routes.push((prefix.to_string(), answer, delay));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|u| u.starts_with(prefix))
    }
}

impl Transport for ScriptedTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        let Some((_, answer, delay)) = self.routes.iter().find(|(p, _, _)| url.starts_with(p.as_str())) else {
            return Err(TransportError::Network(format!("no route for {}", url)));
        };
        if !delay.is_zero() {
            std::thread::sleep(*delay);
        }
        answer.clone()
    }
}
