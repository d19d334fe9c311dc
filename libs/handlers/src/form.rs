use security::FormParams;

use mercury_core::HandlerError;

use crate::request::WebhookRequest;

/// Typed access to decoded form parameters. Required-field lookups fail with
/// a validation error naming the field, so malformed payloads never reach the
/// backend.
#[derive(Debug)]
pub struct Form(FormParams);

impl Form {
    pub fn from_request(request: &WebhookRequest) -> Self {
        Self(request.form())
    }

    pub fn params(&self) -> &FormParams {
        &self.0
    }

    /// First value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First non-empty value for `key`, if present.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn required(&self, key: &str) -> Result<&str, HandlerError> {
        self.get_non_empty(key)
            .ok_or_else(|| HandlerError::validation(format!("missing required field '{key}'")))
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }
}

impl From<FormParams> for Form {
    fn from(params: FormParams) -> Self {
        Self(params)
    }
}
