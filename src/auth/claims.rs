//! Verified token claims.
//!
//! Registered claims are decoded into typed fields once, when the payload is
//! parsed. Claims of the wrong JSON type are treated as absent (`sub`, `iss`,
//! `aud`) so that the validator reports the precise rule that failed; a
//! malformed time claim (`exp`, `iat`, `nbf`) rejects the whole payload.

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::{Map, Value};

/// The `aud` claim, which identity providers publish either as one string
/// or as an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "https://api.example.com"`
    Single(String),
    /// `"aud": ["https://api.example.com", "https://idp.example/userinfo"]`
    Set(Vec<String>),
}

impl Audience {
    /// Whether `expected` is this audience or a member of the set.
    #[must_use]
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(aud) => aud == expected,
            Self::Set(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims carried by a verified token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject (`sub`)
    #[serde(
        rename = "sub",
        default,
        deserialize_with = "string_claim",
        skip_serializing_if = "Option::is_none"
    )]
    pub subject: Option<String>,

    /// Issuer (`iss`)
    #[serde(
        rename = "iss",
        default,
        deserialize_with = "string_claim",
        skip_serializing_if = "Option::is_none"
    )]
    pub issuer: Option<String>,

    /// Audience (`aud`)
    #[serde(
        rename = "aud",
        default,
        deserialize_with = "audience_claim",
        skip_serializing_if = "Option::is_none"
    )]
    pub audience: Option<Audience>,

    /// Expiry (`exp`), seconds since the Unix epoch
    #[serde(
        rename = "exp",
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<i64>,

    /// Issued-at (`iat`), seconds since the Unix epoch
    #[serde(
        rename = "iat",
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<i64>,

    /// Not-before (`nbf`), seconds since the Unix epoch
    #[serde(
        rename = "nbf",
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<i64>,

    /// Every other claim, untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClaimSet {
    /// Look up an extension claim by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

fn string_claim<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn audience_claim<'de, D>(deserializer: D) -> Result<Option<Audience>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(aud) => Some(Audience::Single(aud)),
        Value::Array(items) => Some(Audience::Set(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(aud) => Some(aud),
                    _ => None,
                })
                .collect(),
        )),
        _ => None,
    })
}

/// RFC 7519 `NumericDate`: an integer or fractional number of seconds.
/// Fractions are truncated toward negative infinity.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
            .map(Some)
            .ok_or_else(|| D::Error::custom("numeric date out of range")),
        other => Err(D::Error::custom(format!(
            "numeric date must be a number, got {other}"
        ))),
    }
}
