use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Fields extracted from one storefront page.
///
/// Serialized with the same keys the analysis prompt embeds, so the model sees exactly
/// what the UI shows under "raw intelligence".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    /// Normalized URL that was fetched.
    pub url: String,
    pub title: String,
    /// `content` of `<meta name="description">`, empty when absent.
    pub description: String,
    pub h1: Vec<String>,
    /// First five `<h2>` texts in document order.
    pub h2: Vec<String>,
    pub schema_check: SchemaCheck,
    /// At most two parsed JSON-LD documents, in document order.
    pub raw_json_ld: Vec<serde_json::Value>,
}

impl ScrapeResult {
    pub fn schema_found(&self) -> bool {
        self.schema_check == SchemaCheck::Found
    }
}

/// Whether any `application/ld+json` block parsed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaCheck {
    Found,
    Missing,
}

impl SchemaCheck {
    pub fn from_found(found: bool) -> Self {
        if found {
            Self::Found
        } else {
            Self::Missing
        }
    }
}

/// Implementation effort the model assigns to an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown complexity {other:?}, expected Low/Medium/High")),
        }
    }
}

impl<'de> Deserialize<'de> for Complexity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One recommended automation idea, as returned by the analysis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub title: String,
    pub description: String,
    pub complexity: Complexity,
    /// Return-on-investment score, 1 to 10.
    #[serde(deserialize_with = "deserialize_roi")]
    pub roi: u8,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Models asked for `"roi": "Score 1-10"` answer with either `7` or `"7"`; accept both.
fn deserialize_roi<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n,
        Raw::Float(f) if f.fract() == 0.0 => f as i64,
        Raw::Float(f) => {
            return Err(serde::de::Error::custom(format!("roi must be a whole number, got {f}")))
        }
        Raw::Text(s) => s
            .trim()
            .trim_end_matches("/10")
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("roi is not a number: {s:?}")))?,
    };

    if !(1..=10).contains(&value) {
        return Err(serde::de::Error::custom(format!("roi {value} outside 1..=10")));
    }
    Ok(value as u8)
}

/// User-supplied model API credential.
///
/// `Debug` and `Display` are redacted; read the key only through [`ApiKey::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for an empty or whitespace-only key.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
