use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::{
    features::explore::{
        models::{CityOption, CondominiumOption, ListingRecord, StateOption},
        query::{Field, OrderSpec, Predicate, PredicateSet},
    },
    services::database::Database,
    utilities::errors::AppError,
};

/// Read side of the listing store.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Listings matching every predicate, ordered by `order`.
    async fn list(
        &self,
        predicates: &PredicateSet,
        order: OrderSpec,
    ) -> Result<Vec<ListingRecord>, AppError>;
}

/// Options for the cascading state -> city -> condominium selects.
#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn states(&self) -> Result<Vec<StateOption>, AppError>;
    async fn cities(&self, state_id: Uuid) -> Result<Vec<CityOption>, AppError>;
    async fn condominiums(&self, city_id: Uuid) -> Result<Vec<CondominiumOption>, AppError>;
}

const SELECT_BASE: &str = r#"
    SELECT
        l.id,
        l.title,
        l.description,
        l.price::float8 AS price,
        l.category,
        l.type,
        l.status,
        l.condominium_id,
        c.city_id,
        ci.state_id,
        l.created_at,

        -- joined names
        c.name AS condominium_name,
        ci.name AS city_name,
        s.name AS state_name
    "#;

pub async fn fetch_listings(
    pool: &PgPool,
    predicates: &PredicateSet,
    order: OrderSpec,
) -> Result<Vec<ListingRecord>, AppError> {
    let mut listing_qb = build_listing_query(predicates, order);

    debug!("listing query: {}", listing_qb.sql());

    let rows = listing_qb
        .build_query_as::<ListingRecord>()
        .fetch_all(pool)
        .await?;

    debug!("listing query returned {} rows", rows.len());

    Ok(rows)
}

pub fn build_listing_query(
    predicates: &PredicateSet,
    order: OrderSpec,
) -> QueryBuilder<'static, Postgres> {
    let mut listing_qb = QueryBuilder::new(SELECT_BASE);

    if predicates.requires_inner_join() {
        listing_qb.push(
            r#"
            FROM listings l
            JOIN condominiums c ON c.id = l.condominium_id
            JOIN cities ci ON ci.id = c.city_id
            JOIN states s ON s.id = ci.state_id
            WHERE 1=1
            "#,
        );
    } else {
        listing_qb.push(
            r#"
            FROM listings l
            LEFT JOIN condominiums c ON c.id = l.condominium_id
            LEFT JOIN cities ci ON ci.id = c.city_id
            LEFT JOIN states s ON s.id = ci.state_id
            WHERE 1=1
            "#,
        );
    }

    for predicate in predicates.iter() {
        push_predicate(&mut listing_qb, predicate);
    }

    listing_qb
        .push(" ORDER BY ")
        .push(order.field.column())
        .push(if order.descending { " DESC " } else { " ASC " });

    listing_qb
}

fn push_predicate(listing_qb: &mut QueryBuilder<'static, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::Eq { field, value } => {
            listing_qb
                .push(" AND ")
                .push(field.column())
                .push(" = ")
                .push_bind(value.clone());
            if field.is_id() {
                listing_qb.push("::uuid");
            }
        }
        Predicate::AnyOf { field, values } => {
            listing_qb.push(" AND ").push(field.column()).push(" IN (");
            let mut separated = listing_qb.separated(", ");
            for value in values {
                separated.push_bind(value.clone());
            }
            separated.push_unseparated(")");
        }
        Predicate::Contains { fields, needle } => {
            let pattern = format!("%{}%", escape_like(needle));
            listing_qb.push(" AND (");
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    listing_qb.push(" OR ");
                }
                listing_qb
                    .push(field.column())
                    .push(" ILIKE ")
                    .push_bind(pattern.clone());
            }
            listing_qb.push(")");
        }
        Predicate::Gte { field, value } => {
            listing_qb
                .push(" AND ")
                .push(field.column())
                .push(" >= ")
                .push_bind(value.to_string())
                .push("::numeric");
        }
        Predicate::Lte { field, value } => {
            listing_qb
                .push(" AND ")
                .push(field.column())
                .push(" <= ")
                .push_bind(value.to_string())
                .push("::numeric");
        }
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl ListingSource for Database {
    async fn list(
        &self,
        predicates: &PredicateSet,
        order: OrderSpec,
    ) -> Result<Vec<ListingRecord>, AppError> {
        fetch_listings(&self.pool, predicates, order).await
    }
}

#[async_trait]
impl LocationDirectory for Database {
    async fn states(&self) -> Result<Vec<StateOption>, AppError> {
        let states = sqlx::query_as::<_, StateOption>(
            "SELECT id, name, abbreviation FROM states ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(states)
    }

    async fn cities(&self, state_id: Uuid) -> Result<Vec<CityOption>, AppError> {
        let cities = sqlx::query_as::<_, CityOption>(
            "SELECT id, state_id, name FROM cities WHERE state_id = $1 ORDER BY name",
        )
        .bind(state_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(cities)
    }

    async fn condominiums(&self, city_id: Uuid) -> Result<Vec<CondominiumOption>, AppError> {
        let condominiums = sqlx::query_as::<_, CondominiumOption>(
            "SELECT id, city_id, name FROM condominiums WHERE city_id = $1 ORDER BY name",
        )
        .bind(city_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(condominiums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::explore::{models::FilterState, query::compose};

    fn normalized_sql(predicates: &PredicateSet) -> String {
        build_listing_query(predicates, OrderSpec::default())
            .sql()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn default_filters_query_active_newest_first() {
        let predicates = compose(&FilterState::new(1000.0), 1000.0, None);
        let sql = normalized_sql(&predicates);

        assert!(sql.contains("LEFT JOIN condominiums c ON c.id = l.condominium_id"));
        assert!(sql.contains("AND l.status = $1"));
        assert!(sql.ends_with("ORDER BY l.created_at DESC"));
    }

    #[test]
    fn location_filters_switch_to_inner_join() {
        let mut state = FilterState::new(1000.0);
        state.location.state_id = Some(Uuid::nil().to_string());
        let sql = normalized_sql(&compose(&state, 1000.0, None));

        assert!(sql.contains("FROM listings l JOIN condominiums c"));
        assert!(sql.contains("AND ci.state_id = $2::uuid"));
    }

    #[test]
    fn service_type_and_search_render_or_groups() {
        let mut state = FilterState::new(1000.0);
        state.show_sold_items = true;
        state.selected_type = Some(crate::features::explore::models::ListingType::Service);
        state.search_term = "50%_off".to_string();
        state.price_range = crate::features::explore::models::PriceRange::new(5.0, 100.0);
        let sql = normalized_sql(&compose(&state, 1000.0, None));

        assert!(sql.contains("AND l.type IN ($1, $2)"));
        assert!(sql.contains("AND (l.title ILIKE $3 OR l.description ILIKE $4)"));
        assert!(sql.contains("AND l.price >= $5::numeric AND l.price <= $6::numeric"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
