//! Listing endpoints.
//!
//! Listings are readable by anyone. Creating one requires a session and makes
//! the requester its host; every later mutation is restricted to that host.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::{
    now_timestamp, CreateListingRequest, Listing, ListingQuery, ReplaceListingRequest,
    UpdateListingRequest, User, LISTING_ORDERING_FIELDS, LISTING_SEARCH_FIELDS,
};
use crate::{AppState, DbPool};

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::filters::{
    non_empty, order_by, parse_bool, parse_finite, parse_number, FilterSet, SqlValue,
};
use super::validation::{
    validate_description, validate_guest_count, validate_location, validate_price,
    validate_property_type, validate_title, validate_uuid,
};

const NOT_HOST: &str = "You do not have permission to modify this listing";

/// Validate the fields present in a listing change set
fn validate_changes(req: &UpdateListingRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        errors.check("title", validate_title(title));
    }
    if let Some(ref description) = req.description {
        errors.check("description", validate_description(description));
    }
    if let Some(ref location) = req.location {
        errors.check("location", validate_location(location));
    }
    if let Some(ref property_type) = req.property_type {
        errors.check("property_type", validate_property_type(property_type));
    }
    if let Some(price) = req.price_per_night {
        errors.check("price_per_night", validate_price(price));
    }
    if let Some(guests) = req.number_of_guests {
        errors.check("number_of_guests", validate_guest_count(guests));
    }

    errors.finish()
}

/// Translate collection query parameters into SQL conditions
fn listing_filters(query: &ListingQuery) -> Result<FilterSet, ApiError> {
    let mut filters = FilterSet::new();

    filters
        .eq_text("property_type", query.property_type.as_deref())
        .eq_text("location", query.location.as_deref());

    if let Some(raw) = non_empty(query.available.as_deref()) {
        filters.push("available = ?", SqlValue::Bool(parse_bool("available", raw)?));
    }

    filters.search(query.search.as_deref(), &LISTING_SEARCH_FIELDS);

    if let Some(raw) = non_empty(query.min_price.as_deref()) {
        let min = parse_finite("min_price", raw)?;
        filters.push("price_per_night >= ?", SqlValue::Real(min));
    }
    if let Some(raw) = non_empty(query.max_price.as_deref()) {
        let max = parse_finite("max_price", raw)?;
        filters.push("price_per_night <= ?", SqlValue::Real(max));
    }
    if let Some(raw) = non_empty(query.guests.as_deref()) {
        let guests: i64 = parse_number("guests", raw)?;
        filters.push("number_of_guests >= ?", SqlValue::Integer(guests));
    }

    Ok(filters)
}

/// Load a listing or answer 404
pub(crate) async fn fetch_listing(db: &DbPool, id: &str) -> Result<Listing, ApiError> {
    if validate_uuid(id, "listing_id").is_err() {
        return Err(ApiError::not_found("Listing not found"));
    }

    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing not found"))
}

/// Load a listing the requester hosts: 404 if missing, 403 if not theirs
async fn fetch_hosted_listing(db: &DbPool, id: &str, user: &User) -> Result<Listing, ApiError> {
    let listing = fetch_listing(db, id).await?;
    if !listing.is_hosted_by(&user.id) {
        return Err(ApiError::forbidden(NOT_HOST));
    }
    Ok(listing)
}

/// List listings with filtering, search and ordering
///
/// GET /api/listings
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let filters = listing_filters(&query)?;
    let order = order_by(
        query.ordering.as_deref(),
        &LISTING_ORDERING_FIELDS,
        "-created_at",
        "",
    );

    let sql = format!(
        "SELECT * FROM listings {} ORDER BY {}",
        filters.where_clause(),
        order
    );
    let listings = filters
        .bind(sqlx::query_as::<_, Listing>(&sql))
        .fetch_all(&state.db)
        .await?;

    Ok(Json(listings))
}

/// GET /api/listings/:id
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    Ok(Json(fetch_listing(&state.db, &id).await?))
}

/// Create a listing hosted by the requester
///
/// POST /api/listings
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiJson(req): ApiJson<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    validate_changes(&UpdateListingRequest::from(req.clone()))?;

    let id = Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO listings (
            id, title, description, location, property_type, price_per_night,
            number_of_guests, available, host_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.location.trim())
    .bind(&req.property_type)
    .bind(req.price_per_night)
    .bind(req.number_of_guests)
    .bind(req.available)
    .bind(&user.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let listing = fetch_listing(&state.db, &id).await?;

    info!(listing_id = %listing.id, host_id = %user.id, "Listing created");

    Ok((StatusCode::CREATED, Json(listing)))
}

async fn apply_update(
    state: &AppState,
    user: &User,
    id: &str,
    req: UpdateListingRequest,
) -> Result<Listing, ApiError> {
    fetch_hosted_listing(&state.db, id, user).await?;
    validate_changes(&req)?;

    sqlx::query(
        r#"
        UPDATE listings SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            location = COALESCE(?, location),
            property_type = COALESCE(?, property_type),
            price_per_night = COALESCE(?, price_per_night),
            number_of_guests = COALESCE(?, number_of_guests),
            available = COALESCE(?, available),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.title.as_deref().map(str::trim))
    .bind(&req.description)
    .bind(req.location.as_deref().map(str::trim))
    .bind(&req.property_type)
    .bind(req.price_per_night)
    .bind(req.number_of_guests)
    .bind(req.available)
    .bind(now_timestamp())
    .bind(id)
    .execute(&state.db)
    .await?;

    let listing = fetch_listing(&state.db, id).await?;

    info!(listing_id = %listing.id, host_id = %user.id, "Listing updated");

    Ok(listing)
}

/// Replace every editable field of a listing
///
/// PUT /api/listings/:id
pub async fn replace_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReplaceListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    Ok(Json(apply_update(&state, &user, &id, req.into()).await?))
}

/// Change some fields of a listing
///
/// PATCH /api/listings/:id
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    Ok(Json(apply_update(&state, &user, &id, req).await?))
}

/// Delete a listing that has no bookings
///
/// DELETE /api/listings/:id
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let listing = fetch_hosted_listing(&state.db, &id, &user).await?;

    let (bookings,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE listing_id = ?")
        .bind(&listing.id)
        .fetch_one(&state.db)
        .await?;
    if bookings > 0 {
        return Err(ApiError::conflict(format!(
            "Listing has {} booking(s) and cannot be deleted",
            bookings
        )));
    }

    let result = sqlx::query("DELETE FROM listings WHERE id = ?")
        .bind(&listing.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Listing not found"));
    }

    info!(listing_id = %listing.id, host_id = %user.id, "Listing deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Listings hosted by the requester
///
/// GET /api/listings/my_listings
pub async fn my_listings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let listings = sqlx::query_as::<_, Listing>(
        "SELECT * FROM listings WHERE host_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(listings))
}

/// Listings currently open for booking
///
/// GET /api/listings/available
pub async fn available_listings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let listings = sqlx::query_as::<_, Listing>(
        "SELECT * FROM listings WHERE available = 1 ORDER BY created_at DESC, rowid DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(listings))
}

/// Flip a listing between available and unavailable
///
/// POST /api/listings/:id/toggle_availability
pub async fn toggle_availability(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    let listing = fetch_hosted_listing(&state.db, &id, &user).await?;

    sqlx::query("UPDATE listings SET available = ?, updated_at = ? WHERE id = ?")
        .bind(!listing.available)
        .bind(now_timestamp())
        .bind(&listing.id)
        .execute(&state.db)
        .await?;

    let listing = fetch_listing(&state.db, &listing.id).await?;

    info!(
        listing_id = %listing.id,
        available = listing.available,
        "Listing availability toggled"
    );

    Ok(Json(listing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_filters_price_and_guests() {
        let query = ListingQuery {
            min_price: Some("50".to_string()),
            max_price: Some("100".to_string()),
            guests: Some("3".to_string()),
            ..Default::default()
        };

        let filters = listing_filters(&query).unwrap();
        assert_eq!(
            filters.where_clause(),
            "WHERE price_per_night >= ? AND price_per_night <= ? AND number_of_guests >= ?"
        );
    }

    #[test]
    fn test_listing_filters_ignore_blank_values() {
        let query = ListingQuery {
            min_price: Some(String::new()),
            available: Some(" ".to_string()),
            search: Some("".to_string()),
            ..Default::default()
        };

        assert!(listing_filters(&query).unwrap().is_empty());
    }

    #[test]
    fn test_listing_filters_reject_garbage() {
        let query = ListingQuery {
            guests: Some("lots".to_string()),
            ..Default::default()
        };
        let err = listing_filters(&query).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let query = ListingQuery {
            available: Some("maybe".to_string()),
            ..Default::default()
        };
        assert!(listing_filters(&query).is_err());

        let query = ListingQuery {
            min_price: Some("NaN".to_string()),
            ..Default::default()
        };
        assert!(listing_filters(&query).is_err());
    }

    #[test]
    fn test_validate_changes_only_checks_present_fields() {
        assert!(validate_changes(&UpdateListingRequest::default()).is_ok());

        let req = UpdateListingRequest {
            price_per_night: Some(0.0),
            number_of_guests: Some(0),
            ..Default::default()
        };
        let err = validate_changes(&req).unwrap_err();
        assert!(err.message().contains("2 fields"));
    }
}
