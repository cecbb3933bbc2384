//! Listing models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub property_type: String,
    pub price_per_night: f64,
    pub number_of_guests: i64,
    pub available: bool,
    #[serde(rename = "host")]
    pub host_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Listing {
    pub fn is_hosted_by(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }
}

fn default_available() -> bool {
    true
}

/// Body of `POST /listings`.
///
/// A client-supplied `host` is not part of the body and is dropped by serde.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub property_type: String,
    pub price_per_night: f64,
    pub number_of_guests: i64,
    #[serde(default = "default_available")]
    pub available: bool,
}

/// Body of `PUT /listings/:id`.
///
/// Leaving out `available` keeps the stored value.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceListingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub property_type: String,
    pub price_per_night: f64,
    pub number_of_guests: i64,
    pub available: Option<bool>,
}

/// Body of `PATCH /listings/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub price_per_night: Option<f64>,
    pub number_of_guests: Option<i64>,
    pub available: Option<bool>,
}

impl From<CreateListingRequest> for UpdateListingRequest {
    fn from(req: CreateListingRequest) -> Self {
        Self {
            title: Some(req.title),
            description: Some(req.description),
            location: Some(req.location),
            property_type: Some(req.property_type),
            price_per_night: Some(req.price_per_night),
            number_of_guests: Some(req.number_of_guests),
            available: Some(req.available),
        }
    }
}

impl From<ReplaceListingRequest> for UpdateListingRequest {
    fn from(req: ReplaceListingRequest) -> Self {
        Self {
            title: Some(req.title),
            description: Some(req.description),
            location: Some(req.location),
            property_type: Some(req.property_type),
            price_per_night: Some(req.price_per_night),
            number_of_guests: Some(req.number_of_guests),
            available: req.available,
        }
    }
}

/// Query parameters accepted by `GET /listings`.
///
/// Numeric and boolean values stay raw here so that malformed input turns
/// into a field-level validation error instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub property_type: Option<String>,
    pub available: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub guests: Option<String>,
}

/// Fields a listing collection may be ordered by
pub const LISTING_ORDERING_FIELDS: [&str; 3] =
    ["price_per_night", "created_at", "number_of_guests"];

/// Fields `search` matches against
pub const LISTING_SEARCH_FIELDS: [&str; 3] = ["title", "description", "location"];
