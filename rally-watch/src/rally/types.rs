//! Rally API response DTOs.
//!
//! These map directly to the booking site's JSON. Fields are `Option`
//! wherever the API has been seen to omit them; validation happens in
//! `convert`, not here.

use serde::Deserialize;

/// One entry of `GET /stations`.
#[derive(Debug, Clone, Deserialize)]
pub struct StationRecord {
    /// Numeric station id.
    pub id: u64,

    /// Display name, usually the city.
    pub name: Option<String>,

    /// Street address.
    pub address: Option<String>,

    /// City, when published separately.
    #[serde(default)]
    pub city: Option<String>,
}

/// Response of `GET /stations/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StationDetail {
    /// Station ids a vehicle picked up here may be returned to.
    ///
    /// Kept loose: entries that are not integers are skipped during conversion.
    #[serde(default)]
    pub returns: Option<Vec<serde_json::Value>>,
}

/// One entry of `GET /timeframes/{origin}-{destination}`.
///
/// Dates are ISO 8601 datetimes such as `2024-05-01T00:00:00+02:00`;
/// only the date part is meaningful.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeframe {
    pub start_date: String,
    pub end_date: String,
}

/// One offer from `GET /search`. Only the vehicle model is read.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchOffer {
    #[serde(default)]
    pub model: Option<OfferModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferModel {
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<OfferImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferImage {
    pub image: Option<ImageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_record_tolerates_missing_optional_fields() {
        let record: StationRecord = serde_json::from_str(r#"{"id": 12, "name": "Berlin"}"#).unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.name.as_deref(), Some("Berlin"));
        assert!(record.address.is_none());
        assert!(record.city.is_none());
    }

    #[test]
    fn station_detail_without_returns() {
        let detail: StationDetail = serde_json::from_str(r#"{"id": 12}"#).unwrap();
        assert!(detail.returns.is_none());
    }

    #[test]
    fn timeframe_camel_case() {
        let tf: Timeframe = serde_json::from_str(
            r#"{"startDate": "2024-05-01T00:00:00+02:00", "endDate": "2024-05-10T00:00:00+02:00"}"#,
        )
        .unwrap();
        assert!(tf.start_date.starts_with("2024-05-01"));
        assert!(tf.end_date.starts_with("2024-05-10"));
    }

    #[test]
    fn search_offer_reads_nested_model() {
        let offer: SearchOffer = serde_json::from_str(
            r#"{"id": 9, "model": {"name": "Beach Hostel", "images": [{"image": {"url": "https://cdn.example.com/m/beach.png"}}]}}"#,
        )
        .unwrap();
        let model = offer.model.unwrap();
        assert_eq!(model.name.as_deref(), Some("Beach Hostel"));
        assert_eq!(
            model.images[0].image.as_ref().and_then(|i| i.url.as_deref()),
            Some("https://cdn.example.com/m/beach.png")
        );

        let bare: SearchOffer = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert!(bare.model.is_none());
    }
}
