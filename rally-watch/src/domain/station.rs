//! Station identity and coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid station identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid station id: {reason}")]
pub struct InvalidStationId {
    reason: &'static str,
}

/// Upstream station identifier.
///
/// The rally API uses numeric ids, but anything made of ASCII letters,
/// digits, `-` and `_` is accepted so ids survive a provider change.
///
/// # Examples
///
/// ```
/// use rally_watch::domain::StationId;
///
/// let id = StationId::parse("42").unwrap();
/// assert_eq!(id.as_str(), "42");
///
/// assert!(StationId::parse("").is_err());
/// assert!(StationId::parse("4 2").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationId(String);

impl StationId {
    /// Parse a station id, rejecting empty or non-token strings.
    pub fn parse(s: &str) -> Result<Self, InvalidStationId> {
        if s.is_empty() {
            return Err(InvalidStationId {
                reason: "must not be empty",
            });
        }

        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(InvalidStationId {
                reason: "must contain only ASCII letters, digits, '-' or '_'",
            });
        }

        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for StationId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<String> for StationId {
    type Error = InvalidStationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StationId> for String {
    fn from(id: StationId) -> Self {
        id.0
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationId({})", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate, returning `None` if it is outside WGS84 bounds.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }
}

/// A pickup or drop-off location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,

    /// Display name, already cleaned of punctuation and diacritics.
    pub name: String,

    /// Street address as published upstream.
    pub address: String,

    /// City, when the provider publishes one separately from the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    /// Resolved coordinate; `None` until geocoding succeeds.
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

impl Station {
    /// Create a station with no coordinate yet.
    pub fn new(id: StationId, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
            city: None,
            coordinate: None,
        }
    }

    /// Set the city.
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// The locality used for geocoding: the city if known, else the name.
    ///
    /// Rally stations are usually named after their city ("Berlin", "Munich"),
    /// so the name is a reasonable stand-in.
    pub fn locality(&self) -> &str {
        self.city.as_deref().unwrap_or(&self.name)
    }
}
