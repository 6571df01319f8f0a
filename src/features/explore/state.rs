use tracing::debug;

use crate::features::explore::models::{
    FilterState, ListingStatus, ListingType, LocationFilter, PriceRange,
};

/// Filter selections of one explore session.
///
/// Setters never fail. Location setters keep the state -> city ->
/// condominium hierarchy consistent: changing a level clears everything
/// below it, and a child can't be selected without its parent.
#[derive(Clone, Debug)]
pub struct FilterStore {
    state: FilterState,
    max_price: f64,
}

impl FilterStore {
    pub fn new(max_price: f64) -> Self {
        Self {
            state: FilterState::new(max_price),
            max_price,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    pub fn search_term(&self) -> &str {
        &self.state.search_term
    }

    pub fn set_search_term(&mut self, search_term: impl Into<String>) {
        self.state.search_term = search_term.into();
    }

    pub fn price_range(&self) -> PriceRange {
        self.state.price_range
    }

    pub fn set_price_range(&mut self, price_range: PriceRange) {
        self.state.price_range = price_range;
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.state.selected_category.as_deref()
    }

    pub fn set_selected_category(&mut self, category: Option<String>) {
        self.state.selected_category = category;
    }

    pub fn selected_type(&self) -> Option<ListingType> {
        self.state.selected_type
    }

    pub fn set_selected_type(&mut self, listing_type: Option<ListingType>) {
        self.state.selected_type = listing_type;
    }

    pub fn selected_status(&self) -> Option<ListingStatus> {
        self.state.selected_status
    }

    pub fn set_selected_status(&mut self, status: Option<ListingStatus>) {
        self.state.selected_status = status;
    }

    pub fn show_sold_items(&self) -> bool {
        self.state.show_sold_items
    }

    pub fn set_show_sold_items(&mut self, show: bool) {
        self.state.show_sold_items = show;
    }

    pub fn location(&self) -> &LocationFilter {
        &self.state.location
    }

    pub fn set_state_id(&mut self, state_id: Option<String>) {
        self.state.location = LocationFilter {
            state_id,
            city_id: None,
            condominium_id: None,
        };
    }

    pub fn set_city_id(&mut self, city_id: Option<String>) {
        if city_id.is_some() && self.state.location.state_id.is_none() {
            debug!("ignoring city selection without a state");
            return;
        }
        self.state.location.city_id = city_id;
        self.state.location.condominium_id = None;
    }

    pub fn set_condominium_id(&mut self, condominium_id: Option<String>) {
        if condominium_id.is_some() && self.state.location.city_id.is_none() {
            debug!("ignoring condominium selection without a city");
            return;
        }
        self.state.location.condominium_id = condominium_id;
    }

    /// Sets the condominium without the parent check. Deep links and the
    /// "my condominium" toggle only know the condominium id.
    pub fn override_condominium_id(&mut self, condominium_id: Option<String>) {
        self.state.location.condominium_id = condominium_id;
    }

    pub fn is_condominium_filter(&self) -> bool {
        self.state.is_condominium_filter
    }

    pub fn set_is_condominium_filter(&mut self, enabled: bool) {
        self.state.is_condominium_filter = enabled;
    }

    pub fn sheet_open(&self) -> bool {
        self.state.sheet_open
    }

    pub fn set_sheet_open(&mut self, open: bool) {
        self.state.sheet_open = open;
    }

    pub fn reset(&mut self) {
        let sheet_open = self.state.sheet_open;
        self.state = FilterState::new(self.max_price);
        self.state.sheet_open = sheet_open;
    }

    /// Number of filters that differ from their defaults, shown as a badge
    /// next to the filter button. Location counts once.
    pub fn active_filter_count(&self) -> usize {
        let state = &self.state;
        [
            !state.search_term.trim().is_empty(),
            state.selected_category.is_some(),
            state.selected_type.is_some(),
            state.selected_status.is_some(),
            state.show_sold_items,
            !state.location.is_empty() || state.is_condominium_filter,
            !state.price_range.is_full(self.max_price),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }
}
