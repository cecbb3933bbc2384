//! Booking models, DTOs and the status state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Cancelled,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Statuses that still describe a stay that is going to happen
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// pending -> confirmed, host only.
    pub fn confirm(
        self,
        requester_id: &str,
        parties: &BookingParties<'_>,
    ) -> Result<Self, TransitionError> {
        if requester_id != parties.host_id {
            return Err(TransitionError::NotHost);
        }
        if self != Self::Pending {
            return Err(TransitionError::CannotConfirm(self));
        }
        Ok(Self::Confirmed)
    }

    /// anything but completed -> cancelled, guest or host.
    pub fn cancel(
        self,
        requester_id: &str,
        parties: &BookingParties<'_>,
    ) -> Result<Self, TransitionError> {
        if !parties.includes(requester_id) {
            return Err(TransitionError::NotParticipant);
        }
        if self == Self::Completed {
            return Err(TransitionError::CannotCancel);
        }
        Ok(Self::Cancelled)
    }

    /// Dates may only be edited while the stay is still active.
    pub fn ensure_editable(self) -> Result<(), TransitionError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(TransitionError::CannotModify(self))
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(format!(
                "Invalid status '{}'. Must be one of: pending, confirmed, cancelled, completed",
                other
            )),
        }
    }
}

/// The two users a booking belongs to
#[derive(Debug, Clone, Copy)]
pub struct BookingParties<'a> {
    pub guest_id: &'a str,
    pub host_id: &'a str,
}

impl BookingParties<'_> {
    pub fn includes(&self, user_id: &str) -> bool {
        self.guest_id == user_id || self.host_id == user_id
    }
}

/// Rejected status transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Only the listing host can confirm bookings")]
    NotHost,

    #[error("You do not have permission to cancel this booking")]
    NotParticipant,

    #[error("Cannot confirm booking with status: {0}")]
    CannotConfirm(BookingStatus),

    #[error("Cannot cancel a completed booking")]
    CannotCancel,

    #[error("Cannot modify booking with status: {0}")]
    CannotModify(BookingStatus),
}

impl TransitionError {
    /// Whether the failure is about who is asking rather than the booking state
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::NotHost | Self::NotParticipant)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: String,
    #[serde(rename = "listing")]
    pub listing_id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    pub check_in_date: String,
    pub check_out_date: String,
    pub total_price: f64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Booking {
    /// Unknown values in the column are treated as pending, like the CHECK default.
    pub fn status_enum(&self) -> BookingStatus {
        self.status.parse().unwrap_or(BookingStatus::Pending)
    }
}

/// A booking joined with the host of its listing
#[derive(Debug, Clone, FromRow)]
pub struct BookingWithHost {
    #[sqlx(flatten)]
    pub booking: Booking,
    pub host_id: String,
}

impl BookingWithHost {
    pub fn parties(&self) -> BookingParties<'_> {
        BookingParties {
            guest_id: &self.booking.user_id,
            host_id: &self.host_id,
        }
    }
}

/// Price of a stay, rounded to cents
pub fn quote_total(price_per_night: f64, check_in: NaiveDate, check_out: NaiveDate) -> f64 {
    let nights = (check_out - check_in).num_days().max(0) as f64;
    (nights * price_per_night * 100.0).round() / 100.0
}

/// Body of `POST /bookings`.
///
/// `user`, `status` and `total_price` are server-controlled and ignored if sent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub listing: String,
    pub check_in_date: String,
    pub check_out_date: String,
}

/// Body of `PUT /bookings/:id`
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceBookingRequest {
    pub check_in_date: String,
    pub check_out_date: String,
}

/// Body of `PATCH /bookings/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBookingRequest {
    pub check_in_date: Option<String>,
    pub check_out_date: Option<String>,
}

impl From<ReplaceBookingRequest> for UpdateBookingRequest {
    fn from(req: ReplaceBookingRequest) -> Self {
        Self {
            check_in_date: Some(req.check_in_date),
            check_out_date: Some(req.check_out_date),
        }
    }
}

/// Query parameters accepted by `GET /bookings`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingQuery {
    pub status: Option<String>,
    pub listing: Option<String>,
    pub user: Option<String>,
    pub ordering: Option<String>,
}

/// Fields a booking collection may be ordered by
pub const BOOKING_ORDERING_FIELDS: [&str; 3] = ["check_in_date", "created_at", "total_price"];

#[cfg(test)]
mod tests {
    use super::*;

    const PARTIES: BookingParties<'static> = BookingParties {
        guest_id: "guest",
        host_id: "host",
    };

    #[test]
    fn test_host_confirms_pending() {
        assert_eq!(
            BookingStatus::Pending.confirm("host", &PARTIES),
            Ok(BookingStatus::Confirmed)
        );
    }

    #[test]
    fn test_guest_cannot_confirm() {
        assert_eq!(
            BookingStatus::Pending.confirm("guest", &PARTIES),
            Err(TransitionError::NotHost)
        );
        assert_eq!(
            BookingStatus::Pending.confirm("stranger", &PARTIES),
            Err(TransitionError::NotHost)
        );
    }

    #[test]
    fn test_confirm_checks_permission_before_status() {
        // A non-host learns nothing about the booking state
        assert_eq!(
            BookingStatus::Confirmed.confirm("guest", &PARTIES),
            Err(TransitionError::NotHost)
        );
    }

    #[test]
    fn test_confirm_requires_pending() {
        for status in [
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
        ] {
            let err = status.confirm("host", &PARTIES).unwrap_err();
            assert_eq!(err, TransitionError::CannotConfirm(status));
            assert!(err.to_string().contains(status.as_str()));
        }
    }

    #[test]
    fn test_cancel_by_either_party() {
        for requester in ["guest", "host"] {
            assert_eq!(
                BookingStatus::Pending.cancel(requester, &PARTIES),
                Ok(BookingStatus::Cancelled)
            );
            assert_eq!(
                BookingStatus::Confirmed.cancel(requester, &PARTIES),
                Ok(BookingStatus::Cancelled)
            );
        }
    }

    #[test]
    fn test_cancel_rejects_strangers_and_completed() {
        assert_eq!(
            BookingStatus::Pending.cancel("stranger", &PARTIES),
            Err(TransitionError::NotParticipant)
        );
        assert_eq!(
            BookingStatus::Completed.cancel("guest", &PARTIES),
            Err(TransitionError::CannotCancel)
        );
    }

    #[test]
    fn test_cancel_is_idempotent() {
        assert_eq!(
            BookingStatus::Cancelled.cancel("guest", &PARTIES),
            Ok(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
        assert!("archived".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_quote_total() {
        let check_in = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
        let check_out = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        assert_eq!(quote_total(75.5, check_in, check_out), 226.5);
        assert_eq!(quote_total(33.333, check_in, check_out), 100.0);
        assert_eq!(quote_total(50.0, check_out, check_in), 0.0);
    }

    #[test]
    fn test_transition_error_kinds() {
        assert!(TransitionError::NotHost.is_permission());
        assert!(TransitionError::NotParticipant.is_permission());
        assert!(!TransitionError::CannotCancel.is_permission());
    }
}
