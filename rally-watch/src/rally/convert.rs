//! Conversion from rally DTOs to domain types.
//!
//! Upstream records are loosely typed. Everything is validated here, and
//! records that fail are quarantined (logged and dropped) one at a time
//! rather than failing the whole fetch.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::domain::{DateRange, InvalidRoute, Route, Station, StationId, VehicleModel};

use super::types::{SearchOffer, StationDetail, StationRecord, Timeframe};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// Missing or blank required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Failed to parse a date
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// The assembled route breaks a domain invariant
    #[error(transparent)]
    InvalidRoute(#[from] InvalidRoute),
}

/// Deserialize each element independently, dropping the ones that fail.
///
/// `what` names the record kind in the log line.
pub fn parse_records<T: DeserializeOwned>(values: Vec<serde_json::Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(kind = what, error = %e, record = %value, "Quarantined malformed record");
                None
            }
        })
        .collect()
}

/// Convert a station record, cleaning up its name and address.
pub fn convert_station(record: &StationRecord) -> Result<Station, ConversionError> {
    let name = required(record.name.as_deref(), "name")?;
    let address = required(record.address.as_deref(), "address")?;

    let mut station = Station::new(StationId::from(record.id), name, address);
    if let Some(city) = record.city.as_deref().map(clean_text)
        && !city.is_empty()
    {
        station.city = Some(city);
    }
    Ok(station)
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, ConversionError> {
    let cleaned = value.map(clean_text).unwrap_or_default();
    if cleaned.is_empty() {
        return Err(ConversionError::MissingField(field));
    }
    Ok(cleaned)
}

/// Destination ids listed by a station detail response.
///
/// Non-integer entries are logged and skipped.
pub fn return_ids(origin: &StationId, detail: &StationDetail) -> Vec<StationId> {
    let Some(returns) = detail.returns.as_deref() else {
        return Vec::new();
    };

    returns
        .iter()
        .filter_map(|value| match value.as_u64() {
            Some(id) => Some(StationId::from(id)),
            None => {
                warn!(%origin, entry = %value, "Skipping non-numeric return station");
                None
            }
        })
        .collect()
}

/// Parse the date part (`YYYY-MM-DD`) of an ISO datetime.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ConversionError> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| ConversionError::InvalidDate(raw.to_string()))
}

/// Build a route from two converted stations and one timeframe.
pub fn convert_route(
    origin: &Station,
    destination: &Station,
    timeframe: &Timeframe,
) -> Result<Route, ConversionError> {
    let start = parse_date(&timeframe.start_date)?;
    let end = parse_date(&timeframe.end_date)?;
    let window = DateRange::new(start, end)?;
    Ok(Route::new(origin.clone(), destination.clone(), window)?)
}

/// The vehicle offered for a pair: the first search offer with a named model.
pub fn vehicle_model(offers: &[SearchOffer]) -> Option<VehicleModel> {
    offers.iter().find_map(|offer| {
        let model = offer.model.as_ref()?;
        let name = model.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        let image_url = model
            .images
            .iter()
            .find_map(|i| i.image.as_ref()?.url.clone())
            .filter(|url| !url.is_empty());
        Some(VehicleModel {
            name: name.to_string(),
            image_url,
        })
    })
}

/// Normalize a name or address from the booking site.
///
/// Transliterates the German and Spanish characters the site uses, drops
/// punctuation and quotes, turns separators into spaces, and collapses
/// whitespace. Geocoders match the result far more reliably.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'ß' => out.push_str("ss"),
            'Ä' => out.push_str("Ae"),
            'Ö' => out.push_str("OE"),
            'Ü' => out.push_str("UE"),
            'ø' => out.push_str("oe"),
            'Ø' => out.push_str("OE"),
            'Á' => out.push('A'),
            'É' => out.push('E'),
            'Í' => out.push('I'),
            'Ó' => out.push('O'),
            'Ú' => out.push('U'),
            'á' => out.push('a'),
            'é' => out.push('e'),
            'í' => out.push('i'),
            'ó' => out.push('o'),
            'ú' => out.push('u'),
            ',' | ';' | ':' | '!' | '?' | '.' | '(' | ')' | '\'' | '"' | '‘' | '’' | '“'
            | '”' => {}
            '-' | '_' | '/' | '\\' | '|' | '\t' => out.push(' '),
            other => out.push(other),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
