use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Addressing schemes understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrnScheme {
    Tel,
    WhatsApp,
}

impl UrnScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrnScheme::Tel => "tel",
            UrnScheme::WhatsApp => "whatsapp",
        }
    }
}

impl fmt::Display for UrnScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrnError {
    #[error("invalid whatsapp identifier: {0}")]
    InvalidWhatsAppId(String),
    #[error("invalid phone number: {0}")]
    InvalidNumber(String),
    #[error("cannot resolve country for number: {0}")]
    UnknownCountry(String),
}

/// Canonical endpoint address: a scheme plus a scheme-specific path.
///
/// ```
/// use mercury_core::{Urn, UrnScheme};
///
/// let urn = Urn::whatsapp("+12211414154").unwrap();
/// assert_eq!(urn.scheme(), UrnScheme::WhatsApp);
/// assert_eq!(urn.path(), "12211414154");
/// assert_eq!(urn.to_string(), "whatsapp:12211414154");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Urn {
    scheme: UrnScheme,
    path: String,
}

static NUMBER_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-().]").expect("valid regex"));

impl Urn {
    /// Builds a WhatsApp urn from a provider identifier. Official WhatsApp
    /// ids carry no leading `+`, so one is stripped if present.
    pub fn whatsapp(id: &str) -> Result<Self, UrnError> {
        let id = id.trim().trim_start_matches('+');
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UrnError::InvalidWhatsAppId(id.to_string()));
        }
        Ok(Self {
            scheme: UrnScheme::WhatsApp,
            path: id.to_string(),
        })
    }

    /// Builds a telephone urn, normalizing `number` towards E.164 with an
    /// optional ISO-3166 country hint for national-format numbers.
    /// Shortcodes (up to six digits) pass through without a prefix.
    pub fn tel(number: &str, country: Option<&str>) -> Result<Self, UrnError> {
        let cleaned = NUMBER_PUNCT.replace_all(number.trim(), "");
        let (has_plus, digits) = match cleaned.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_ref()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UrnError::InvalidNumber(number.to_string()));
        }

        let path = if has_plus {
            if digits.len() > 15 {
                return Err(UrnError::InvalidNumber(number.to_string()));
            }
            format!("+{digits}")
        } else if digits.len() <= 6 {
            // shortcode
            digits.to_string()
        } else if let Some(code) = country.and_then(dial_code) {
            let national = digits.trim_start_matches('0');
            let full = format!("+{code}{national}");
            if full.len() > 16 {
                return Err(UrnError::InvalidNumber(number.to_string()));
            }
            full
        } else if digits.len() >= 11 && digits.len() <= 15 {
            // long enough to already carry a country code
            format!("+{digits}")
        } else {
            return Err(UrnError::UnknownCountry(number.to_string()));
        };

        Ok(Self {
            scheme: UrnScheme::Tel,
            path,
        })
    }

    pub fn scheme(&self) -> UrnScheme {
        self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)
    }
}

fn dial_code(country: &str) -> Option<&'static str> {
    let code = match country.to_ascii_uppercase().as_str() {
        "US" | "CA" => "1",
        "GB" => "44",
        "DE" => "49",
        "FR" => "33",
        "ES" => "34",
        "IT" => "39",
        "BR" => "55",
        "MX" => "52",
        "IN" => "91",
        "NG" => "234",
        "KE" => "254",
        "ZA" => "27",
        "AU" => "61",
        "ID" => "62",
        "PH" => "63",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_strips_leading_plus() {
        let urn = Urn::whatsapp("+12211414154").unwrap();
        assert_eq!(urn.path(), "12211414154");
        assert_eq!(urn.to_string(), "whatsapp:12211414154");
    }

    #[test]
    fn whatsapp_rejects_garbage() {
        assert!(Urn::whatsapp("").is_err());
        assert!(Urn::whatsapp("+").is_err());
        assert!(Urn::whatsapp("not-a-number").is_err());
    }

    #[test]
    fn tel_accepts_e164() {
        let urn = Urn::tel("+1 (206) 555-1212", None).unwrap();
        assert_eq!(urn.path(), "+12065551212");
        assert_eq!(urn.scheme(), UrnScheme::Tel);
    }

    #[test]
    fn tel_applies_country_hint() {
        let urn = Urn::tel("2065551212", Some("US")).unwrap();
        assert_eq!(urn.path(), "+12065551212");

        let urn = Urn::tel("07700 900123", Some("GB")).unwrap();
        assert_eq!(urn.path(), "+447700900123");
    }

    #[test]
    fn tel_passes_shortcodes_through() {
        let urn = Urn::tel("55555", None).unwrap();
        assert_eq!(urn.path(), "55555");
    }

    #[test]
    fn tel_rejects_national_number_without_country() {
        assert!(matches!(
            Urn::tel("2065551212", None),
            Err(UrnError::UnknownCountry(_))
        ));
        assert!(matches!(
            Urn::tel("2065551212", Some("XX")),
            Err(UrnError::UnknownCountry(_))
        ));
    }

    #[test]
    fn tel_rejects_garbage() {
        assert!(Urn::tel("hello", None).is_err());
        assert!(Urn::tel("", Some("US")).is_err());
        assert!(Urn::tel("+123456789012345678", None).is_err());
    }
}
