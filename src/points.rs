//! Points ledger: append-only signed entries plus the denormalized balance
//! on the user row, both written in the same transaction. Voiding reverses
//! the delta and removes the ledger row.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::VOID_WINDOW_DAYS;
use crate::booking::get_booking;
use crate::error::BookingError;
use crate::store::{PgTx, Store, UserStore, adjust_points};
use crate::types::{PointType, PointsTransaction};

#[derive(Clone)]
pub struct PointsLedger {
    users: UserStore,
    store: Store,
}

/// Result of voiding a ledger entry.
#[derive(Debug, Serialize)]
pub struct VoidOutcome {
    pub message: String,
    pub points_adjusted: i64,
}

/// The signed delta a ledger row stores: earns positive, redeems negative.
pub fn signed_delta(point_type: PointType, points: i64) -> i64 {
    match point_type {
        PointType::Earn => points,
        PointType::Redeem => -points,
    }
}

/// A transaction may only be voided within a fixed window of its creation.
pub fn within_void_window(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at <= Duration::days(VOID_WINDOW_DAYS)
}

impl PointsLedger {
    pub fn new(users: UserStore, store: Store) -> Self {
        Self { users, store }
    }

    /// Writes one ledger entry for a booking and moves the user's balance by
    /// the same signed delta, atomically.
    pub async fn create(
        &self,
        user_id: i64,
        booking_id: i64,
        point_type: PointType,
        points: i64,
    ) -> Result<PointsTransaction, BookingError> {
        let user = self.users.require(user_id).await?;

        let booking = get_booking(self.store.pool(), booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking not found"))?;

        if booking.user_id != user_id {
            return Err(BookingError::business_rule(
                "Booking does not belong to this user",
            ));
        }

        if point_type == PointType::Redeem && points > user.points {
            return Err(BookingError::business_rule(
                "Insufficient points for redemption",
            ));
        }

        if points <= 0 {
            return Err(BookingError::validation("Points must be greater than 0"));
        }

        let delta = signed_delta(point_type, points);

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let entry =
                        insert_entry(tx, user_id, Some(booking_id), point_type, delta).await?;
                    adjust_points(tx, user_id, delta).await?;
                    Ok(entry)
                })
            })
            .await
    }

    pub async fn earn(
        &self,
        user_id: i64,
        booking_id: i64,
        points: i64,
    ) -> Result<PointsTransaction, BookingError> {
        self.create(user_id, booking_id, PointType::Earn, points)
            .await
    }

    pub async fn redeem(
        &self,
        user_id: i64,
        booking_id: i64,
        points: i64,
    ) -> Result<PointsTransaction, BookingError> {
        self.create(user_id, booking_id, PointType::Redeem, points)
            .await
    }

    /// Reverses a ledger entry's exact signed delta and hard-deletes the
    /// row. Only entries younger than the void window qualify.
    pub async fn void(&self, id: i64) -> Result<VoidOutcome, BookingError> {
        let entry = sqlx::query_as::<_, PointsTransaction>(
            r#"SELECT id, user_id, booking_id, point_type, points, created_at
               FROM points_transactions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(self.store.pool())
        .await?
        .ok_or_else(|| BookingError::not_found("Points transaction not found"))?;

        if !within_void_window(entry.created_at, Utc::now()) {
            return Err(BookingError::business_rule(
                "Cannot void transaction older than 30 days",
            ));
        }

        let delta = -entry.points;
        let user_id = entry.user_id;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    adjust_points(tx, user_id, delta).await?;
                    delete_entry(tx, id).await?;
                    Ok(())
                })
            })
            .await?;

        Ok(VoidOutcome {
            message: "Transaction voided successfully".to_string(),
            points_adjusted: delta,
        })
    }
}

/// Inserts one signed ledger row inside the caller's transaction. Shared
/// with the booking-confirmation path, which earns in the same transaction
/// that completes the booking.
pub(crate) async fn insert_entry(
    tx: &mut PgTx,
    user_id: i64,
    booking_id: Option<i64>,
    point_type: PointType,
    signed_points: i64,
) -> Result<PointsTransaction, BookingError> {
    let entry = sqlx::query_as::<_, PointsTransaction>(
        r#"INSERT INTO points_transactions (user_id, booking_id, point_type, points)
           VALUES ($1, $2, $3, $4)
           RETURNING id, user_id, booking_id, point_type, points, created_at"#,
    )
    .bind(user_id)
    .bind(booking_id)
    .bind(point_type)
    .bind(signed_points)
    .fetch_one(tx.as_mut())
    .await?;
    Ok(entry)
}

async fn delete_entry(tx: &mut PgTx, id: i64) -> Result<(), BookingError> {
    sqlx::query("DELETE FROM points_transactions WHERE id = $1")
        .bind(id)
        .execute(tx.as_mut())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earns_store_positive_redeems_negative() {
        assert_eq!(signed_delta(PointType::Earn, 90), 90);
        assert_eq!(signed_delta(PointType::Redeem, 90), -90);
    }

    #[test]
    fn void_reversal_negates_the_stored_delta() {
        // Voiding an earn takes points away; voiding a redeem gives them back.
        assert_eq!(-signed_delta(PointType::Earn, 50), -50);
        assert_eq!(-signed_delta(PointType::Redeem, 50), 50);
    }

    #[test]
    fn void_window_is_thirty_days_inclusive() {
        let now = Utc::now();
        assert!(within_void_window(now - Duration::days(29), now));
        assert!(within_void_window(now - Duration::days(30), now));
        assert!(!within_void_window(now - Duration::days(31), now));
    }
}
