use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    features::explore::{
        categories::CategoryId,
        fetcher::{FetchState, Notification},
        models::{FilterState, ListingRecord, ListingStatus, ListingType, PriceRange},
    },
    utilities::errors::AppError,
};

/// Partial filter change. Absent fields are left untouched; `null` clears
/// a nullable selection.
#[derive(Deserialize, Validate, Default, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterUpdate {
    #[validate(length(max = 200))]
    pub search_term: Option<String>,
    pub price_range: Option<PriceRange>,
    #[serde(deserialize_with = "double_option")]
    pub selected_category: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub selected_type: Option<Option<ListingType>>,
    #[serde(deserialize_with = "double_option")]
    pub selected_status: Option<Option<ListingStatus>>,
    pub show_sold_items: Option<bool>,
    #[serde(deserialize_with = "double_option")]
    pub state_id: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub city_id: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub condominium_id: Option<Option<String>>,
    pub is_condominium_filter: Option<bool>,
    pub sheet_open: Option<bool>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl FilterUpdate {
    pub fn check_price_range(&self, max_price: f64) -> Result<(), AppError> {
        let Some(range) = self.price_range else {
            return Ok(());
        };
        if !range.min.is_finite() || !range.max.is_finite() {
            return Err(AppError::ValidationError(
                "Price range must be finite".to_string(),
            ));
        }
        if range.min < 0.0 || range.max > max_price {
            return Err(AppError::ValidationError(format!(
                "Price range must be within [0, {max_price}]"
            )));
        }
        if range.min > range.max {
            return Err(AppError::ValidationError(
                "Minimum price cannot exceed maximum price".to_string(),
            ));
        }
        Ok(())
    }

    /// Location ids are stored as uuids; anything else could never match.
    pub fn check_location_ids(&self) -> Result<(), AppError> {
        for (name, id) in [
            ("stateId", &self.state_id),
            ("cityId", &self.city_id),
            ("condominiumId", &self.condominium_id),
        ] {
            if let Some(Some(id)) = id
                && Uuid::parse_str(id).is_err()
            {
                return Err(AppError::ValidationError(format!(
                    "{name} must be a uuid, got {id:?}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExploreResponse {
    pub filters: FilterState,
    pub active_filter_count: usize,
    pub generation: u64,
    pub loading: bool,
    pub listings: Vec<ListingRecord>,
    pub error: Option<String>,
    pub notifications: Vec<Notification>,
}

impl ExploreResponse {
    pub fn new(
        filters: FilterState,
        active_filter_count: usize,
        fetch: FetchState,
        notifications: Vec<Notification>,
    ) -> Self {
        Self {
            filters,
            active_filter_count,
            generation: fetch.generation,
            loading: fetch.loading,
            listings: fetch.listings,
            error: fetch.error,
            notifications,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct CategoryOut {
    pub id: CategoryId,
    pub label: &'static str,
}

impl From<CategoryId> for CategoryOut {
    fn from(id: CategoryId) -> Self {
        Self {
            id,
            label: id.label(),
        }
    }
}
