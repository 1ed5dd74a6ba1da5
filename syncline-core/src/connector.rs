//! Connector configuration model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An immutable snapshot of a connector's configuration.
///
/// Set at creation and never mutated; the backend receives this as the body
/// of `POST /api/connectors`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ConnectorSpec {
    /// The URL of the external API to subscribe to.
    pub url: String,
    /// The HTTP method used when polling the external API.
    #[serde(default = "ConnectorSpec::default_method")]
    pub method: String,
    /// Static headers sent with every request to the external API.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Static query parameters sent with every request to the external API.
    #[serde(default, alias = "queryParams")]
    pub query_params: BTreeMap<String, String>,
    /// The auth configuration of the external API.
    #[serde(default)]
    pub auth: AuthSpec,
    /// The backend polling interval, in seconds.
    #[serde(default = "ConnectorSpec::default_polling_interval", alias = "pollingInterval")]
    pub polling_interval_secs: u64,
}

impl ConnectorSpec {
    fn default_method() -> String {
        "GET".into()
    }

    fn default_polling_interval() -> u64 {
        60
    }
}

/// Auth configuration for a connector's external API.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AuthSpec {
    /// The auth scheme, e.g. `none`, `api-key` or `bearer-token`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Auth field values keyed by field name, e.g. `token`, `api_key`.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}
