use serde::Serialize;
use tracing::warn;

use crate::features::explore::{
    categories::CategoryMapping,
    models::{FilterState, ListingRecord, ListingType},
};

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Status,
    Category,
    Type,
    CondominiumId,
    CityId,
    StateId,
    Title,
    Description,
    Price,
    CreatedAt,
}

impl Field {
    /// Column in the explore join graph (`listings l`, `condominiums c`,
    /// `cities ci`). City and state live on the listing's condominium.
    pub fn column(self) -> &'static str {
        match self {
            Self::Status => "l.status",
            Self::Category => "l.category",
            Self::Type => "l.type",
            Self::CondominiumId => "l.condominium_id",
            Self::CityId => "c.city_id",
            Self::StateId => "ci.state_id",
            Self::Title => "l.title",
            Self::Description => "l.description",
            Self::Price => "l.price",
            Self::CreatedAt => "l.created_at",
        }
    }

    pub fn is_id(self) -> bool {
        matches!(self, Self::CondominiumId | Self::CityId | Self::StateId)
    }

    fn text_of(self, record: &ListingRecord) -> Option<String> {
        match self {
            Self::Status => Some(record.status.clone()),
            Self::Category => Some(record.category.clone()),
            Self::Type => Some(record.listing_type.clone()),
            Self::CondominiumId => record.condominium_id.map(|id| id.to_string()),
            Self::CityId => record.city_id.map(|id| id.to_string()),
            Self::StateId => record.state_id.map(|id| id.to_string()),
            Self::Title => Some(record.title.clone()),
            Self::Description => record.description.clone(),
            Self::Price => Some(record.price.to_string()),
            Self::CreatedAt => Some(record.created_at.to_rfc3339()),
        }
    }
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    Eq { field: Field, value: String },
    AnyOf { field: Field, values: Vec<String> },
    /// Case-insensitive substring match on any of `fields`.
    Contains { fields: Vec<Field>, needle: String },
    Gte { field: Field, value: f64 },
    Lte { field: Field, value: f64 },
}

impl Predicate {
    pub fn matches(&self, record: &ListingRecord) -> bool {
        match self {
            Self::Eq { field, value } => field.text_of(record).as_deref() == Some(value.as_str()),
            Self::AnyOf { field, values } => field
                .text_of(record)
                .is_some_and(|text| values.iter().any(|value| *value == text)),
            Self::Contains { fields, needle } => {
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    field
                        .text_of(record)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            }
            Self::Gte { value, .. } => record.price >= *value,
            Self::Lte { value, .. } => record.price <= *value,
        }
    }
}

/// AND-combined predicates in the order they were composed.
#[derive(Serialize, Clone, PartialEq, Default, Debug)]
pub struct PredicateSet(Vec<Predicate>);

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.0.push(predicate);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// City and state filter on the joined condominium, so a listing
    /// without one must not survive the join.
    pub fn requires_inner_join(&self) -> bool {
        self.0.iter().any(|predicate| {
            matches!(
                predicate,
                Predicate::Eq {
                    field: Field::CityId | Field::StateId,
                    ..
                }
            )
        })
    }

    pub fn matches(&self, record: &ListingRecord) -> bool {
        self.0.iter().all(|predicate| predicate.matches(record))
    }
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct OrderSpec {
    pub field: Field,
    pub descending: bool,
}

impl Default for OrderSpec {
    fn default() -> Self {
        Self {
            field: Field::CreatedAt,
            descending: true,
        }
    }
}

/// Translates filter selections into backend predicates.
///
/// Rules run in a fixed order (status, category, type, location, search,
/// price) and only ever add predicates.
pub fn compose(
    state: &FilterState,
    max_price: f64,
    user_condominium_id: Option<&str>,
) -> PredicateSet {
    let mut predicates = PredicateSet::new();

    if let Some(status) = state.selected_status {
        predicates.push(Predicate::Eq {
            field: Field::Status,
            value: status.backend_code().to_string(),
        });
    } else if !state.show_sold_items {
        predicates.push(Predicate::Eq {
            field: Field::Status,
            value: "active".to_string(),
        });
    }

    if let Some(category) = state.selected_category.as_deref() {
        let resolved = CategoryMapping::to_backend(category);
        if !resolved.is_mapped() {
            warn!(category, "unmapped category, filtering on the raw value");
        }
        predicates.push(Predicate::Eq {
            field: Field::Category,
            value: resolved.value().to_string(),
        });
    }

    match state.selected_type {
        Some(ListingType::Service) => predicates.push(Predicate::AnyOf {
            field: Field::Type,
            values: ListingType::Service
                .backend_values()
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }),
        Some(ListingType::Product) => predicates.push(Predicate::Eq {
            field: Field::Type,
            value: ListingType::Product.backend_values()[0].to_string(),
        }),
        None => {}
    }

    let condominium_id = match user_condominium_id {
        Some(own) if state.is_condominium_filter => Some(own),
        _ => state.location.condominium_id.as_deref(),
    };
    if let Some(condominium_id) = condominium_id {
        predicates.push(Predicate::Eq {
            field: Field::CondominiumId,
            value: condominium_id.to_string(),
        });
    }
    if let Some(city_id) = &state.location.city_id {
        predicates.push(Predicate::Eq {
            field: Field::CityId,
            value: city_id.clone(),
        });
    }
    if let Some(state_id) = &state.location.state_id {
        predicates.push(Predicate::Eq {
            field: Field::StateId,
            value: state_id.clone(),
        });
    }

    let needle = state.search_term.trim();
    if !needle.is_empty() {
        predicates.push(Predicate::Contains {
            fields: vec![Field::Title, Field::Description],
            needle: needle.to_string(),
        });
    }

    if !state.price_range.is_full(max_price) {
        predicates.push(Predicate::Gte {
            field: Field::Price,
            value: state.price_range.min,
        });
        predicates.push(Predicate::Lte {
            field: Field::Price,
            value: state.price_range.max,
        });
    }

    predicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::explore::models::{ListingStatus, PriceRange};

    const MAX_PRICE: f64 = 5000.0;

    fn status_predicates(predicates: &PredicateSet) -> Vec<&Predicate> {
        predicates
            .iter()
            .filter(|p| matches!(p, Predicate::Eq { field: Field::Status, .. }))
            .collect()
    }

    #[test]
    fn explicit_status_wins_over_hidden_sold_items() {
        for status in [
            ListingStatus::Available,
            ListingStatus::Reserved,
            ListingStatus::Sold,
        ] {
            let mut state = FilterState::new(MAX_PRICE);
            state.show_sold_items = false;
            state.selected_status = Some(status);

            let predicates = compose(&state, MAX_PRICE, None);
            assert_eq!(
                status_predicates(&predicates),
                vec![&Predicate::Eq {
                    field: Field::Status,
                    value: status.backend_code().to_string(),
                }]
            );
        }
    }

    #[test]
    fn hidden_sold_items_restrict_to_active() {
        let state = FilterState::new(MAX_PRICE);
        let predicates = compose(&state, MAX_PRICE, None);
        assert_eq!(
            predicates.iter().collect::<Vec<_>>(),
            vec![&Predicate::Eq {
                field: Field::Status,
                value: "active".to_string(),
            }]
        );

        let mut state = FilterState::new(MAX_PRICE);
        state.show_sold_items = true;
        assert!(compose(&state, MAX_PRICE, None).is_empty());
    }

    #[test]
    fn full_price_range_emits_nothing() {
        let mut state = FilterState::new(MAX_PRICE);
        state.show_sold_items = true;
        state.price_range = PriceRange::full(MAX_PRICE);
        assert!(compose(&state, MAX_PRICE, None).is_empty());

        state.price_range = PriceRange::new(0.0, MAX_PRICE - 1.0);
        let predicates = compose(&state, MAX_PRICE, None);
        assert_eq!(
            predicates.iter().collect::<Vec<_>>(),
            vec![
                &Predicate::Gte {
                    field: Field::Price,
                    value: 0.0
                },
                &Predicate::Lte {
                    field: Field::Price,
                    value: MAX_PRICE - 1.0
                },
            ]
        );
    }

    #[test]
    fn service_type_matches_both_spellings() {
        let mut state = FilterState::new(MAX_PRICE);
        state.show_sold_items = true;
        state.selected_type = Some(ListingType::Service);
        let predicates = compose(&state, MAX_PRICE, None);

        let accented = ListingRecord {
            listing_type: "serviço".to_string(),
            ..Default::default()
        };
        let plain = ListingRecord {
            listing_type: "servico".to_string(),
            ..Default::default()
        };
        let product = ListingRecord {
            listing_type: "produto".to_string(),
            ..Default::default()
        };

        assert!(predicates.matches(&accented));
        assert!(predicates.matches(&plain));
        assert!(!predicates.matches(&product));
    }

    #[test]
    fn category_resolves_or_passes_through() {
        let mut state = FilterState::new(MAX_PRICE);
        state.show_sold_items = true;
        state.selected_category = Some("servicos".to_string());
        assert_eq!(
            compose(&state, MAX_PRICE, None).iter().next(),
            Some(&Predicate::Eq {
                field: Field::Category,
                value: "Serviços".to_string(),
            })
        );

        state.selected_category = Some("Jardinagem".to_string());
        assert_eq!(
            compose(&state, MAX_PRICE, None).iter().next(),
            Some(&Predicate::Eq {
                field: Field::Category,
                value: "Jardinagem".to_string(),
            })
        );
    }

    #[test]
    fn condominium_toggle_overrides_selection() {
        let mut state = FilterState::new(MAX_PRICE);
        state.show_sold_items = true;
        state.location.condominium_id = Some("other".to_string());
        state.is_condominium_filter = true;

        let predicates = compose(&state, MAX_PRICE, Some("mine"));
        assert_eq!(
            predicates.iter().collect::<Vec<_>>(),
            vec![&Predicate::Eq {
                field: Field::CondominiumId,
                value: "mine".to_string(),
            }]
        );

        let anonymous = compose(&state, MAX_PRICE, None);
        assert_eq!(
            anonymous.iter().next(),
            Some(&Predicate::Eq {
                field: Field::CondominiumId,
                value: "other".to_string(),
            })
        );
    }

    #[test]
    fn city_and_state_need_inner_join() {
        let mut state = FilterState::new(MAX_PRICE);
        assert!(!compose(&state, MAX_PRICE, None).requires_inner_join());

        state.location.state_id = Some("sp".to_string());
        state.location.city_id = Some("campinas".to_string());
        let predicates = compose(&state, MAX_PRICE, None);
        assert!(predicates.requires_inner_join());

        let without_condominium = ListingRecord {
            status: "active".to_string(),
            ..Default::default()
        };
        assert!(!predicates.matches(&without_condominium));
    }

    #[test]
    fn search_is_trimmed_and_case_insensitive() {
        let mut state = FilterState::new(MAX_PRICE);
        state.show_sold_items = true;
        state.search_term = "  Bolo ".to_string();
        let predicates = compose(&state, MAX_PRICE, None);

        assert_eq!(
            predicates.iter().next(),
            Some(&Predicate::Contains {
                fields: vec![Field::Title, Field::Description],
                needle: "Bolo".to_string(),
            })
        );

        let record = ListingRecord {
            title: "Encomendas".to_string(),
            description: Some("bolo de cenoura caseiro".to_string()),
            ..Default::default()
        };
        assert!(predicates.matches(&record));
    }

    #[test]
    fn rule_order_is_stable() {
        let mut state = FilterState::new(MAX_PRICE);
        state.selected_category = Some("alimentos".to_string());
        state.selected_type = Some(ListingType::Product);
        state.location.condominium_id = Some("c1".to_string());
        state.search_term = "bolo".to_string();
        state.price_range = PriceRange::new(10.0, 20.0);

        let fields: Vec<&str> = compose(&state, MAX_PRICE, None)
            .iter()
            .map(|predicate| match predicate {
                Predicate::Eq { field, .. } | Predicate::AnyOf { field, .. } => field.column(),
                Predicate::Contains { .. } => "search",
                Predicate::Gte { .. } => "min",
                Predicate::Lte { .. } => "max",
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                "l.status",
                "l.category",
                "l.type",
                "l.condominium_id",
                "search",
                "min",
                "max"
            ]
        );
    }
}
