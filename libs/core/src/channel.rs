use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::urn::UrnScheme;

/// Config key holding the shared secret used for webhook signing and API auth.
pub const CONFIG_AUTH_TOKEN: &str = "auth_token";
/// Config key holding the provider account identifier.
pub const CONFIG_ACCOUNT_SID: &str = "account_sid";
/// Config key selecting a pooled messaging service as the routing identity.
pub const CONFIG_MESSAGING_SERVICE_SID: &str = "messaging_service_sid";
/// Config key overriding the provider send endpoint.
pub const CONFIG_SEND_URL: &str = "send_url";
/// Config key suppressing non-failure delivery reports for a channel.
pub const CONFIG_IGNORE_DELIVERY_REPORTS: &str = "ignore_delivery_reports";

/// Short code identifying a channel's provider type, e.g. `T` for Twilio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(String);

impl ChannelType {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelType {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// One configured provider connection for one tenant.
///
/// Credentials and behavioral flags live in the string-keyed `config` map;
/// lookups always take an explicit default so absence is a deliberate state,
/// and handlers treat a missing required credential as a hard send-time error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    channel_type: ChannelType,
    uuid: Uuid,
    name: String,
    /// The gateway's own identity on this channel, e.g. a phone number.
    address: String,
    country: Option<String>,
    schemes: Vec<UrnScheme>,
    #[serde(default)]
    config: BTreeMap<String, Value>,
    callback_domain: Option<String>,
}

impl Channel {
    pub fn new(
        channel_type: ChannelType,
        uuid: Uuid,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            channel_type,
            uuid,
            name: name.into(),
            address: address.into(),
            country: None,
            schemes: vec![UrnScheme::Tel],
            config: BTreeMap::new(),
            callback_domain: None,
        }
    }

    pub fn with_schemes(mut self, schemes: Vec<UrnScheme>) -> Self {
        self.schemes = schemes;
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_callback_domain(mut self, domain: impl Into<String>) -> Self {
        self.callback_domain = Some(domain.into());
        self
    }

    pub fn channel_type(&self) -> &ChannelType {
        &self.channel_type
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn schemes(&self) -> &[UrnScheme] {
        &self.schemes
    }

    pub fn is_scheme(&self, scheme: UrnScheme) -> bool {
        self.schemes.contains(&scheme)
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Returns the string config for `key`, if present and non-empty.
    pub fn string_config(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn string_config_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.string_config(key).unwrap_or(default)
    }

    pub fn bool_config_or(&self, key: &str, default: bool) -> bool {
        self.config
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn int_config_or(&self, key: &str, default: i64) -> i64 {
        self.config
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    /// The domain providers should deliver callbacks to, falling back to the
    /// server-wide default when the channel has no override.
    pub fn callback_domain<'a>(&'a self, default: &'a str) -> &'a str {
        self.callback_domain.as_deref().unwrap_or(default)
    }
}
