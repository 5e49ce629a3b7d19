//! Payment records, one per booking. Processing talks to a simulated
//! gateway; a successful charge completes the payment and its booking in
//! one transaction.

use chrono::Utc;
use sqlx::PgPool;

use crate::booking::{
    delete_booking_seats, get_booking, points_earned, set_booking_status, set_seat_status,
};
use crate::error::BookingError;
use crate::fsm::{self, Transition};
use crate::points;
use crate::store::{PgTx, Store, adjust_points};
use crate::types::{BookingStatus, Payment, PaymentMethod, PointType, SeatStatus};

#[derive(Clone)]
pub struct PaymentProcessor {
    store: Store,
}

/// The simulated gateway approves nine charges out of ten.
fn gateway_approves() -> bool {
    rand::random::<f64>() > 0.1
}

impl PaymentProcessor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Registers a payment for a pending booking. A booking gets at most
    /// one payment; a second attempt is a conflict.
    pub async fn create(
        &self,
        booking_id: i64,
        method: PaymentMethod,
    ) -> Result<Payment, BookingError> {
        let booking = get_booking(self.store.pool(), booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking not found"))?;

        let existing = get_payment_for_booking(self.store.pool(), booking_id).await?;
        if existing.is_some() {
            return Err(BookingError::conflict("Booking already has a payment"));
        }

        if booking.payment_status != BookingStatus::Pending {
            return Err(BookingError::business_rule(format!(
                "Cannot create payment for {} booking",
                booking.payment_status.as_str()
            )));
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"INSERT INTO payments (booking_id, method, status)
               VALUES ($1, $2, 'pending')
               RETURNING id, booking_id, method, status, paid_at"#,
        )
        .bind(booking_id)
        .bind(method)
        .fetch_one(self.store.pool())
        .await?;
        Ok(payment)
    }

    /// Runs the charge. On approval the payment and its booking complete
    /// together: seats turn booked, points are earned, the balance moves —
    /// one transaction. On decline nothing is written.
    pub async fn process(
        &self,
        payment_id: i64,
        method: Option<PaymentMethod>,
    ) -> Result<Payment, BookingError> {
        let payment = get_payment(self.store.pool(), payment_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Payment not found"))?;

        if payment.status == BookingStatus::Complete {
            return Err(BookingError::business_rule("Payment already completed"));
        }

        let booking = get_booking(self.store.pool(), payment.booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking not found"))?;

        let next = fsm::apply(booking.payment_status, Transition::Confirm)?;

        if !gateway_approves() {
            return Err(BookingError::business_rule("Payment processing failed"));
        }

        let points = points_earned(booking.total_price);
        let booking_id = booking.id;
        let user_id = booking.user_id;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let paid = complete_payment(tx, payment_id, method).await?;
                    set_booking_status(tx, booking_id, next).await?;
                    set_seat_status(tx, booking_id, SeatStatus::Booked).await?;
                    points::insert_entry(tx, user_id, Some(booking_id), PointType::Earn, points)
                        .await?;
                    adjust_points(tx, user_id, points).await?;
                    Ok(paid)
                })
            })
            .await
    }

    /// Cancels a not-yet-completed payment along with its booking, releasing
    /// the booking's seats.
    pub async fn cancel(&self, payment_id: i64) -> Result<Payment, BookingError> {
        let payment = get_payment(self.store.pool(), payment_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Payment not found"))?;

        if payment.status == BookingStatus::Complete {
            return Err(BookingError::business_rule(
                "Cannot cancel completed payment",
            ));
        }

        let booking_id = payment.booking_id;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let cancelled = sqlx::query_as::<_, Payment>(
                        r#"UPDATE payments SET status = 'cancelled' WHERE id = $1
                           RETURNING id, booking_id, method, status, paid_at"#,
                    )
                    .bind(payment_id)
                    .fetch_one(tx.as_mut())
                    .await?;

                    set_booking_status(tx, booking_id, BookingStatus::Cancelled).await?;
                    delete_booking_seats(tx, booking_id).await?;
                    Ok(cancelled)
                })
            })
            .await
    }
}

async fn complete_payment(
    tx: &mut PgTx,
    payment_id: i64,
    method: Option<PaymentMethod>,
) -> Result<Payment, BookingError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"UPDATE payments
           SET status = 'complete', method = COALESCE($2, method), paid_at = $3
           WHERE id = $1
           RETURNING id, booking_id, method, status, paid_at"#,
    )
    .bind(payment_id)
    .bind(method)
    .bind(Utc::now())
    .fetch_one(tx.as_mut())
    .await?;
    Ok(payment)
}

async fn get_payment(pool: &PgPool, id: i64) -> Result<Option<Payment>, BookingError> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT id, booking_id, method, status, paid_at FROM payments WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(payment)
}

async fn get_payment_for_booking(
    pool: &PgPool,
    booking_id: i64,
) -> Result<Option<Payment>, BookingError> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT id, booking_id, method, status, paid_at FROM payments WHERE booking_id = $1 LIMIT 1",
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?;
    Ok(payment)
}
