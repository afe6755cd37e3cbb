//! Claims carried in the access token payload
//!
//! Tokens are decoded without signature verification; the backend verifies
//! them and the client only reads them. Anything that fails to decode falls
//! back to the default claim set.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// JWT segments are base64url, usually unpadded
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Role of the signed-in user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    /// Generic role, also the fallback when the claim is absent or unreadable
    #[default]
    Admin,
    SchoolLocationAdmin,
    SchoolEnergyManagerAdmin,
    Teacher,
    Pupil,
    EnergyScreenAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::SchoolLocationAdmin => "school-location-admin",
            Self::SchoolEnergyManagerAdmin => "school-energy-manager-admin",
            Self::Teacher => "teacher",
            Self::Pupil => "pupil",
            Self::EnergyScreenAdmin => "energy-screen-admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown user role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    /// Accepts both `school-location-admin` and `school_location_admin`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "admin" => Ok(Self::Admin),
            "school-location-admin" => Ok(Self::SchoolLocationAdmin),
            "school-energy-manager-admin" => Ok(Self::SchoolEnergyManagerAdmin),
            "teacher" => Ok(Self::Teacher),
            "pupil" => Ok(Self::Pupil),
            "energy-screen-admin" => Ok(Self::EnergyScreenAdmin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Claims derived from an access token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub user_id: String,
    pub role: UserRole,
    pub location_id: String,
    pub registration_status: String,
    pub trial_end_on: Option<NaiveDate>,
}

/// Payload as it appears on the wire; every field is optional and may be a
/// string or a number
#[derive(Debug, Default, Deserialize)]
struct RawClaims {
    #[serde(default)]
    user_id: Value,
    #[serde(default)]
    role: Value,
    #[serde(default)]
    location_id: Value,
    #[serde(default)]
    registration_status: Value,
    #[serde(default)]
    trial_end_on: Value,
}

impl Claims {
    /// Decode the claims of an access token, substituting defaults for
    /// anything missing or malformed
    pub fn decode(token: &str) -> Self {
        match decode_payload(token) {
            Some(raw) => Self::from_raw(raw),
            None => {
                debug!("Access token payload could not be decoded, using default claims");
                Self::default()
            }
        }
    }

    /// Decode only the user id claim
    pub fn decode_user_id(token: &str) -> String {
        decode_payload(token)
            .map(|raw| claim_string(&raw.user_id))
            .unwrap_or_default()
    }

    fn from_raw(raw: RawClaims) -> Self {
        let role = match &raw.role {
            Value::Null => UserRole::default(),
            value => claim_string(value).parse().unwrap_or_else(|e: UnknownRole| {
                debug!(role = %e.0, "Unrecognized role claim, falling back to admin");
                UserRole::default()
            }),
        };

        Self {
            user_id: claim_string(&raw.user_id),
            role,
            location_id: claim_string(&raw.location_id),
            registration_status: claim_string(&raw.registration_status),
            trial_end_on: parse_date(&claim_string(&raw.trial_end_on)),
        }
    }
}

fn decode_payload(token: &str) -> Option<RawClaims> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn claim_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Accepts `2025-08-31` or a timestamp starting with that date
fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
