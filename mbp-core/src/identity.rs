//! Identity decoding from session tokens.
//!
//! Decoding is purely structural: the signature, expiry and audience are not
//! checked here. The server rejects expired or forged tokens on the next
//! request, so a decodable token is a usable session at this layer.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TokenError;

/// Claims that may carry the numeric user id, in lookup order.
const USER_ID_CLAIMS: &[&str] = &[
    "id",
    "userId",
    "sub",
    "nameid",
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier",
];

/// The user a session token was issued to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Numeric user id, used to route notifications
    pub id: i64,
    /// User's email address (if present)
    pub email: Option<String>,
    /// User's display name (if present)
    pub name: Option<String>,
    /// Role claim (if present)
    pub role: Option<String>,
    /// Token expiry from the `exp` claim (informational only)
    pub expires_at: Option<DateTime<Utc>>,
    /// Every other claim, verbatim
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Identity {
    /// Create an identity carrying only a user id
    pub fn new(id: i64) -> Self {
        Self {
            id,
            email: None,
            name: None,
            role: None,
            expires_at: None,
            extra: Map::new(),
        }
    }

    /// Whether the `exp` claim is in the past relative to `now`.
    ///
    /// Never consulted by the session manager; expiry is enforced server-side.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Decodes session tokens into identities without verifying them.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDecoder;

impl IdentityDecoder {
    /// Decode `token` into an [`Identity`].
    ///
    /// # Errors
    ///
    /// `TokenError::Malformed` if the token is not a three-part JWT with
    /// JSON header and claims, `TokenError::MissingUserId` if no claim holds
    /// a numeric user id.
    pub fn decode(token: &str) -> Result<Identity, TokenError> {
        let claims = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(&[]),
            &structural_validation(),
        )?
        .claims;

        Self::from_claims(claims)
    }

    fn from_claims(mut claims: Map<String, Value>) -> Result<Identity, TokenError> {
        let id = USER_ID_CLAIMS
            .iter()
            .find_map(|name| claims.get(*name).and_then(numeric_claim))
            .ok_or(TokenError::MissingUserId)?;

        let email = take_string(&mut claims, "email");
        let name = take_string(&mut claims, "name");
        let role = take_string(&mut claims, "role");
        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| DateTime::from_timestamp(exp, 0));

        Ok(Identity {
            id,
            email,
            name,
            role,
            expires_at,
            extra: claims,
        })
    }
}

fn structural_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

fn numeric_claim(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn take_string(claims: &mut Map<String, Value>, key: &str) -> Option<String> {
    match claims.get(key) {
        Some(Value::String(_)) => match claims.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}
