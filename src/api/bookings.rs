//! Booking endpoints.
//!
//! Every route requires a session. A booking is visible to, and may be
//! edited by, its guest and the host of the booked listing. Status only
//! moves through the `confirm` and `cancel` actions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::{
    now_timestamp, quote_total, Booking, BookingQuery, BookingStatus, BookingWithHost,
    CreateBookingRequest, ReplaceBookingRequest, UpdateBookingRequest, User,
    BOOKING_ORDERING_FIELDS,
};
use crate::{AppState, DbPool};

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::filters::{non_empty, order_by, FilterSet, SqlValue};
use super::listings::fetch_listing;
use super::validation::{parse_date, validate_stay, validate_uuid};

/// Bookings joined with their listing's host
const BOOKING_WITH_HOST: &str =
    "SELECT b.*, l.host_id AS host_id FROM bookings b JOIN listings l ON l.id = b.listing_id";

/// Parse and check a stay, reporting problems per field
fn parse_stay(check_in: &str, check_out: &str) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let check_in = match parse_date(check_in, "Check-in date") {
        Ok(date) => Some(date),
        Err(e) => {
            errors.add("check_in_date", e);
            None
        }
    };
    let check_out = match parse_date(check_out, "Check-out date") {
        Ok(date) => Some(date),
        Err(e) => {
            errors.add("check_out_date", e);
            None
        }
    };

    if let (Some(check_in), Some(check_out)) = (check_in, check_out) {
        errors.check("check_out_date", validate_stay(check_in, check_out));
        errors.finish()?;
        return Ok((check_in, check_out));
    }

    errors.finish()?;
    Err(ApiError::internal("Stay dates could not be parsed"))
}

/// Load any booking with its host, or answer 404
async fn fetch_booking(db: &DbPool, id: &str) -> Result<BookingWithHost, ApiError> {
    if validate_uuid(id, "booking_id").is_err() {
        return Err(ApiError::not_found("Booking not found"));
    }

    sqlx::query_as::<_, BookingWithHost>(&format!("{} WHERE b.id = ?", BOOKING_WITH_HOST))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))
}

/// Load a booking the requester is a party to; anything else is 404
async fn fetch_visible_booking(
    db: &DbPool,
    id: &str,
    user: &User,
) -> Result<BookingWithHost, ApiError> {
    let booking = fetch_booking(db, id).await?;
    if !booking.parties().includes(&user.id) {
        return Err(ApiError::not_found("Booking not found"));
    }
    Ok(booking)
}

async fn set_status(db: &DbPool, id: &str, status: BookingStatus) -> Result<Booking, ApiError> {
    sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(id)
        .execute(db)
        .await?;

    Ok(fetch_booking(db, id).await?.booking)
}

/// Translate collection query parameters into SQL conditions, scoped to the requester
fn booking_filters(query: &BookingQuery, user: &User) -> Result<FilterSet, ApiError> {
    let mut filters = FilterSet::new();

    filters.push_many(
        "(b.user_id = ? OR l.host_id = ?)",
        vec![
            SqlValue::Text(user.id.clone()),
            SqlValue::Text(user.id.clone()),
        ],
    );

    if let Some(raw) = non_empty(query.status.as_deref()) {
        let status: BookingStatus = raw
            .parse()
            .map_err(|e: String| ApiError::validation_field("status", e))?;
        filters.push("b.status = ?", SqlValue::Text(status.as_str().to_string()));
    }

    filters
        .eq_text("b.listing_id", query.listing.as_deref())
        .eq_text("b.user_id", query.user.as_deref());

    Ok(filters)
}

/// Bookings the requester made or received
///
/// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<BookingQuery>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let filters = booking_filters(&query, &user)?;
    let order = order_by(
        query.ordering.as_deref(),
        &BOOKING_ORDERING_FIELDS,
        "-created_at",
        "b.",
    );

    let sql = format!(
        "SELECT b.* FROM bookings b JOIN listings l ON l.id = b.listing_id {} ORDER BY {}",
        filters.where_clause(),
        order
    );
    let bookings = filters
        .bind(sqlx::query_as::<_, Booking>(&sql))
        .fetch_all(&state.db)
        .await?;

    Ok(Json(bookings))
}

/// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    Ok(Json(fetch_visible_booking(&state.db, &id, &user).await?.booking))
}

/// Request a stay; the requester becomes the guest
///
/// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let (check_in, check_out) = parse_stay(&req.check_in_date, &req.check_out_date)?;

    let listing = match fetch_listing(&state.db, &req.listing).await {
        Ok(listing) => listing,
        Err(e) if e.status() == StatusCode::NOT_FOUND => {
            return Err(ApiError::validation_field("listing", "Listing does not exist"));
        }
        Err(e) => return Err(e),
    };

    if !listing.available {
        return Err(ApiError::validation_field(
            "listing",
            "Listing is not available for booking",
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = now_timestamp();
    let total_price = quote_total(listing.price_per_night, check_in, check_out);

    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, listing_id, user_id, check_in_date, check_out_date,
            total_price, status, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&listing.id)
    .bind(&user.id)
    .bind(check_in.to_string())
    .bind(check_out.to_string())
    .bind(total_price)
    .bind(BookingStatus::Pending.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let booking = fetch_booking(&state.db, &id).await?.booking;

    info!(
        booking_id = %booking.id,
        listing_id = %listing.id,
        guest_id = %user.id,
        total_price = booking.total_price,
        "Booking created"
    );

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn apply_update(
    state: &AppState,
    user: &User,
    id: &str,
    req: UpdateBookingRequest,
) -> Result<Booking, ApiError> {
    let current = fetch_visible_booking(&state.db, id, user).await?;
    current.booking.status_enum().ensure_editable()?;

    let check_in = req
        .check_in_date
        .as_deref()
        .unwrap_or(current.booking.check_in_date.as_str());
    let check_out = req
        .check_out_date
        .as_deref()
        .unwrap_or(current.booking.check_out_date.as_str());
    let (check_in, check_out) = parse_stay(check_in, check_out)?;

    let (price_per_night,): (f64,) =
        sqlx::query_as("SELECT price_per_night FROM listings WHERE id = ?")
            .bind(&current.booking.listing_id)
            .fetch_one(&state.db)
            .await?;

    sqlx::query(
        r#"
        UPDATE bookings SET
            check_in_date = ?,
            check_out_date = ?,
            total_price = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(check_in.to_string())
    .bind(check_out.to_string())
    .bind(quote_total(price_per_night, check_in, check_out))
    .bind(now_timestamp())
    .bind(id)
    .execute(&state.db)
    .await?;

    let booking = fetch_booking(&state.db, id).await?.booking;

    info!(booking_id = %booking.id, user_id = %user.id, "Booking dates updated");

    Ok(booking)
}

/// PUT /api/bookings/:id
pub async fn replace_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReplaceBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    Ok(Json(apply_update(&state, &user, &id, req.into()).await?))
}

/// PATCH /api/bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    Ok(Json(apply_update(&state, &user, &id, req).await?))
}

/// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let booking = fetch_visible_booking(&state.db, &id, &user).await?.booking;

    sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(&booking.id)
        .execute(&state.db)
        .await?;

    info!(booking_id = %booking.id, user_id = %user.id, "Booking deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Bookings where the requester is the guest
///
/// GET /api/bookings/my_bookings
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(bookings))
}

/// Bookings on listings the requester hosts
///
/// GET /api/bookings/my_property_bookings
pub async fn my_property_bookings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = sqlx::query_as::<_, Booking>(
        r#"
        SELECT b.* FROM bookings b
        JOIN listings l ON l.id = b.listing_id
        WHERE l.host_id = ?
        ORDER BY b.created_at DESC, b.rowid DESC
        "#,
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(bookings))
}

/// Host accepts a pending booking
///
/// POST /api/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let current = fetch_booking(&state.db, &id).await?;
    let next = current
        .booking
        .status_enum()
        .confirm(&user.id, &current.parties())?;

    let booking = set_status(&state.db, &current.booking.id, next).await?;

    info!(booking_id = %booking.id, host_id = %user.id, "Booking confirmed");

    Ok(Json(booking))
}

/// Guest or host calls off a booking
///
/// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let current = fetch_booking(&state.db, &id).await?;
    let previous = current.booking.status_enum();
    let next = previous.cancel(&user.id, &current.parties())?;

    let booking = set_status(&state.db, &current.booking.id, next).await?;

    info!(
        booking_id = %booking.id,
        user_id = %user.id,
        previous_status = %previous,
        "Booking cancelled"
    );

    Ok(Json(booking))
}

/// The requester's stays that have not started yet and are still on
///
/// GET /api/bookings/upcoming
pub async fn upcoming_bookings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let today = chrono::Utc::now().date_naive().to_string();

    let bookings = sqlx::query_as::<_, Booking>(
        r#"
        SELECT * FROM bookings
        WHERE user_id = ?
          AND check_in_date >= ?
          AND status IN (?, ?)
        ORDER BY check_in_date ASC, rowid ASC
        "#,
    )
    .bind(&user.id)
    .bind(&today)
    .bind(BookingStatus::Pending.as_str())
    .bind(BookingStatus::Confirmed.as_str())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(bookings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            name: id.to_string(),
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        }
    }

    #[test]
    fn test_parse_stay() {
        let (check_in, check_out) = parse_stay("2030-06-01", "2030-06-05").unwrap();
        assert_eq!((check_out - check_in).num_days(), 4);
    }

    #[test]
    fn test_parse_stay_rejects_reversed_and_malformed_dates() {
        let err = parse_stay("2030-06-05", "2030-06-01").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Check-out date must be after check-in date");

        let err = parse_stay("tomorrow", "never").unwrap_err();
        assert!(err.message().contains("2 fields"));
    }

    #[test]
    fn test_booking_filters_always_scoped() {
        let filters = booking_filters(&BookingQuery::default(), &user("u1")).unwrap();
        assert_eq!(filters.where_clause(), "WHERE (b.user_id = ? OR l.host_id = ?)");
    }

    #[test]
    fn test_booking_filters_status() {
        let query = BookingQuery {
            status: Some("confirmed".to_string()),
            listing: Some("l1".to_string()),
            ..Default::default()
        };
        let filters = booking_filters(&query, &user("u1")).unwrap();
        assert_eq!(
            filters.where_clause(),
            "WHERE (b.user_id = ? OR l.host_id = ?) AND b.status = ? AND b.listing_id = ?"
        );

        let query = BookingQuery {
            status: Some("archived".to_string()),
            ..Default::default()
        };
        assert!(booking_filters(&query, &user("u1")).is_err());
    }
}
