//! Shared-secret webhook request signing.
//!
//! Many providers authenticate webhook deliveries by signing the callback URL
//! plus the form parameters with a shared secret. This crate implements that
//! canonicalization once so adapters don't each grow their own HMAC logic.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Form parameters keyed by name. A `BTreeMap` keeps keys in the ascending
/// lexicographic order the canonicalization requires; values stay in their
/// original order.
pub type FormParams = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing request signature")]
    Missing,
    #[error("invalid request signature")]
    Invalid,
    #[error("invalid or missing signing secret")]
    Config,
}

/// Computes the base64 HMAC-SHA1 signature over `url` followed by every form
/// key in ascending order, each immediately followed by the concatenation of
/// its values.
///
/// The result is a pure function of `(url, sorted keys, values, secret)`;
/// parameter insertion order does not matter.
pub fn calculate_signature(
    url: &str,
    form: &FormParams,
    secret: &str,
) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::Config);
    }

    let mut buffer = String::with_capacity(url.len() + 64);
    buffer.push_str(url);
    for (key, values) in form {
        buffer.push_str(key);
        for value in values {
            buffer.push_str(value);
        }
    }

    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Config)?;
    mac.update(buffer.as_bytes());
    Ok(B64.encode(mac.finalize().into_bytes()))
}

/// Verifies a signature presented by the caller against the one computed from
/// the request, in constant time.
pub fn verify_signature(
    provided: Option<&str>,
    url: &str,
    form: &FormParams,
    secret: &str,
) -> Result<(), SignatureError> {
    let provided = match provided {
        Some(value) if !value.is_empty() => value,
        _ => return Err(SignatureError::Missing),
    };
    let expected = calculate_signature(url, form, secret)?;
    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::Invalid)
    }
}
