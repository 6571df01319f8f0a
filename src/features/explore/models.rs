use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ListingType {
    #[serde(rename = "produto", alias = "product")]
    Product,
    #[serde(rename = "serviço", alias = "servico", alias = "service")]
    Service,
}

impl ListingType {
    /// Both spellings exist in the `listings.type` column.
    pub const SERVICE_SPELLINGS: [&'static str; 2] = ["serviço", "servico"];

    pub fn backend_values(self) -> &'static [&'static str] {
        match self {
            Self::Product => &["produto"],
            Self::Service => &Self::SERVICE_SPELLINGS,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Reserved,
    Sold,
}

impl ListingStatus {
    pub fn backend_code(self) -> &'static str {
        match self {
            Self::Available => "active",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
        }
    }
}

/// Inclusive price bounds, serialized as `[min, max]`.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Debug)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn full(max_price: f64) -> Self {
        Self::new(0.0, max_price)
    }

    pub fn is_full(&self, max_price: f64) -> bool {
        self.min == 0.0 && self.max == max_price
    }

    /// Pulls the range back inside `[0, max_price]`.
    pub fn clamped(self, max_price: f64) -> Self {
        let max = self.max.min(max_price).max(0.0);
        let min = self.min.max(0.0).min(max);
        Self::new(min, max)
    }
}

impl From<[f64; 2]> for PriceRange {
    fn from([min, max]: [f64; 2]) -> Self {
        Self::new(min, max)
    }
}

impl From<PriceRange> for [f64; 2] {
    fn from(range: PriceRange) -> Self {
        [range.min, range.max]
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LocationFilter {
    pub state_id: Option<String>,
    pub city_id: Option<String>,
    pub condominium_id: Option<String>,
}

impl LocationFilter {
    pub fn is_empty(&self) -> bool {
        self.state_id.is_none() && self.city_id.is_none() && self.condominium_id.is_none()
    }
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub search_term: String,
    pub price_range: PriceRange,
    pub selected_category: Option<String>,
    pub selected_type: Option<ListingType>,
    pub selected_status: Option<ListingStatus>,
    pub show_sold_items: bool,
    pub location: LocationFilter,
    pub is_condominium_filter: bool,
    pub sheet_open: bool,
}

impl FilterState {
    pub fn new(max_price: f64) -> Self {
        Self {
            search_term: String::new(),
            price_range: PriceRange::full(max_price),
            selected_category: None,
            selected_type: None,
            selected_status: None,
            show_sold_items: false,
            location: LocationFilter::default(),
            is_condominium_filter: false,
            sheet_open: false,
        }
    }
}

#[derive(FromRow, Deserialize, Serialize, Clone, PartialEq, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub listing_type: String,
    pub status: String,
    pub condominium_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,

    // joined
    pub condominium_name: Option<String>,
    pub city_name: Option<String>,
    pub state_name: Option<String>,
}

#[derive(FromRow, Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StateOption {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: String,
}

#[derive(FromRow, Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CityOption {
    pub id: Uuid,
    pub state_id: Uuid,
    pub name: String,
}

#[derive(FromRow, Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CondominiumOption {
    pub id: Uuid,
    pub city_id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_accepts_both_spellings() {
        let accented: ListingType = serde_json::from_str("\"serviço\"").unwrap();
        let plain: ListingType = serde_json::from_str("\"servico\"").unwrap();
        assert_eq!(accented, ListingType::Service);
        assert_eq!(plain, ListingType::Service);
        assert_eq!(
            serde_json::to_string(&ListingType::Service).unwrap(),
            "\"serviço\""
        );
    }

    #[test]
    fn price_range_is_a_pair_on_the_wire() {
        let range: PriceRange = serde_json::from_str("[10, 250]").unwrap();
        assert_eq!(range, PriceRange::new(10.0, 250.0));
        assert_eq!(serde_json::to_string(&range).unwrap(), "[10.0,250.0]");
    }

    #[test]
    fn clamping_keeps_min_below_max() {
        assert_eq!(
            PriceRange::new(800.0, 5000.0).clamped(500.0),
            PriceRange::new(500.0, 500.0)
        );
        assert_eq!(
            PriceRange::new(100.0, 400.0).clamped(500.0),
            PriceRange::new(100.0, 400.0)
        );
    }

    #[test]
    fn available_status_is_stored_as_active() {
        assert_eq!(ListingStatus::Available.backend_code(), "active");
        assert_eq!(ListingStatus::Reserved.backend_code(), "reserved");
        assert_eq!(ListingStatus::Sold.backend_code(), "sold");
    }
}
