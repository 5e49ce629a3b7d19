use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle state of a booking (mirrored by its payment, if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Complete,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Complete => "complete",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "complete" => Ok(BookingStatus::Complete),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// Per-seat state on the booking/seat join row. Tracks the parent booking
/// loosely: `selected` while the booking is pending, `booked` once paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Selected,
    Booked,
}

/// Accepted payment channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Qris,
    EWallet,
    BankTransfer,
}

/// Direction of a points-ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "point_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    Earn,
    Redeem,
}

/// A platform user, carrying the denormalized points balance.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// The ID of the user.
    pub id: i64,
    /// The user's display name.
    pub name: String,
    /// The user's email address.
    pub email: String,
    /// The user's phone number, if known.
    pub phone: Option<String>,
    /// Running points balance, kept in sync with the ledger.
    pub points: i64,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}

/// A screening room inside a theater. The price applies per seat.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cinema {
    /// The ID of the cinema.
    pub id: i64,
    /// The theater this cinema belongs to.
    pub theater_id: i64,
    /// The cinema class (Reguler, IMAX, Premier).
    pub cinema_type: String,
    /// Ticket price per seat, in minor currency units.
    pub price: i64,
    /// Number of seats the cinema was seeded with.
    pub total_seats: i32,
}

/// A physical seat, identified by a row-letter/number label unique within
/// its cinema. Immutable once seeded.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Seat {
    /// The ID of the seat.
    pub id: i64,
    /// The cinema owning this seat.
    pub cinema_id: i64,
    /// Human-readable label, e.g. "A1".
    pub seat_number: String,
}

/// A scheduled screening of a movie in a cinema, joined with the pricing
/// and naming context the booking workflow reads.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShowtimeSummary {
    /// The ID of the showtime.
    pub id: i64,
    /// The movie being screened.
    pub movie_id: i64,
    /// The cinema screening it.
    pub cinema_id: i64,
    /// When the screening starts.
    pub start_time: DateTime<Utc>,
    /// Per-seat price of the cinema.
    pub price: i64,
    /// Title of the movie.
    pub movie_title: String,
    /// The cinema class.
    pub cinema_type: String,
    /// Name of the theater housing the cinema.
    pub theater_name: String,
}

/// One reservation attempt by one user for one showtime. `total_price` is
/// frozen at creation and never recomputed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    /// The ID of the booking.
    pub id: i64,
    /// The user who made the booking.
    pub user_id: i64,
    /// The showtime being booked.
    pub showtime_id: i64,
    /// Cinema price × seat count, fixed at creation.
    pub total_price: i64,
    /// Current lifecycle state.
    pub payment_status: BookingStatus,
    /// The timestamp when the booking was created.
    pub created_at: DateTime<Utc>,
}

/// Join row tying a booking to one reserved seat. Deleted when the booking
/// is cancelled.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingSeat {
    /// The ID of the join row.
    pub id: i64,
    /// The owning booking.
    pub booking_id: i64,
    /// The reserved seat.
    pub seat_id: i64,
    /// Per-seat state.
    pub status: SeatStatus,
}

/// Payment record, one per booking.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    /// The ID of the payment.
    pub id: i64,
    /// The booking being paid for.
    pub booking_id: i64,
    /// The payment channel.
    pub method: PaymentMethod,
    /// Mirrors the booking's lifecycle state.
    pub status: BookingStatus,
    /// Set when the payment completes.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Append-only ledger row. Earn rows store a positive delta, redeem rows a
/// negative one; the user's balance moves by exactly this amount in the same
/// transaction.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointsTransaction {
    /// The ID of the ledger row.
    pub id: i64,
    /// The user whose balance moved.
    pub user_id: i64,
    /// The booking that caused the entry, if any.
    pub booking_id: Option<i64>,
    /// Earn or redeem.
    pub point_type: PointType,
    /// Signed point delta.
    pub points: i64,
    /// The timestamp when the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Seat with a reserved-for-showtime flag, as returned by the
/// available-seats lookup.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SeatAvailability {
    /// The ID of the seat.
    pub id: i64,
    /// Human-readable label.
    pub seat_number: String,
    /// False when a complete booking on the showtime holds this seat.
    pub is_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_status_round_trips_through_str() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Complete,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("completed".parse::<BookingStatus>().is_err());
        assert!("".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn payment_method_uses_snake_case_wire_form() {
        let m: PaymentMethod = serde_json::from_str("\"e_wallet\"").unwrap();
        assert_eq!(m, PaymentMethod::EWallet);
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
    }
}
