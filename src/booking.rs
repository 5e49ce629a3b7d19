//! The booking workflow engine: creation, payment confirmation and
//! cancellation of bookings, each a precondition ladder followed by one
//! atomic transaction, plus the read paths over booking state.

use chrono::Utc;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::POINTS_PRICE_DIVISOR;
use crate::catalog::Catalog;
use crate::error::BookingError;
use crate::fsm::{self, Transition};
use crate::points;
use crate::store::{PgTx, Store, UserStore, adjust_points};
use crate::types::{
    Booking, BookingStatus, Payment, PointType, PointsTransaction, SeatStatus, ShowtimeSummary,
};

/// The workflow engine. Holds the catalog-read, user-store and
/// transaction-runner ports; constructed once per process and shared.
#[derive(Clone)]
pub struct BookingWorkflow {
    catalog: Catalog,
    users: UserStore,
    store: Store,
}

/// A booking's nested projection: the row plus the user, showtime, seat and
/// payment context a client needs to render it.
#[derive(Debug, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub user: BookingUser,
    pub showtime: ShowtimeSummary,
    pub seats: Vec<BookedSeat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    pub points_transactions: Vec<PointsTransaction>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BookingUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BookedSeat {
    pub seat_id: i64,
    pub seat_number: String,
    pub status: SeatStatus,
}

/// Cinema price × seat count, computed once and frozen on the booking row.
pub fn total_price(price_per_seat: i64, seat_count: usize) -> i64 {
    price_per_seat * seat_count as i64
}

/// Loyalty points awarded for a completed booking.
pub fn points_earned(total_price: i64) -> i64 {
    total_price / POINTS_PRICE_DIVISOR
}

/// Bounds shared by every paginated read path.
pub fn validate_pagination(page: u32, limit: u32) -> Result<(), BookingError> {
    if page < 1 {
        return Err(BookingError::validation("Page must be greater than 0"));
    }
    if limit < 1 {
        return Err(BookingError::validation("Limit must be greater than 0"));
    }
    if limit > 100 {
        return Err(BookingError::validation("Limit cannot exceed 100"));
    }
    Ok(())
}

impl BookingWorkflow {
    pub fn new(catalog: Catalog, users: UserStore, store: Store) -> Self {
        Self {
            catalog,
            users,
            store,
        }
    }

    /// Creates a booking in `pending` state holding the requested seats.
    ///
    /// Precondition ladder, each failing fast before any write: user exists,
    /// showtime exists and lies in the future, the seat list is non-empty,
    /// every seat belongs to the showtime's cinema, and none of the seats is
    /// held by a `complete` booking on the same showtime. Pending bookings
    /// do not block a seat; only a completed payment does.
    pub async fn create(
        &self,
        user_id: i64,
        showtime_id: i64,
        seat_ids: &[i64],
    ) -> Result<BookingDetail, BookingError> {
        self.users.require(user_id).await?;

        let showtime = self
            .catalog
            .showtime(showtime_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Showtime not found"))?;

        if showtime.start_time <= Utc::now() {
            return Err(BookingError::business_rule("Cannot book for past showtime"));
        }

        if seat_ids.is_empty() {
            return Err(BookingError::validation(
                "At least one seat must be selected",
            ));
        }

        let matching = self
            .catalog
            .count_cinema_seats(showtime.cinema_id, seat_ids)
            .await?;
        if matching != seat_ids.len() as i64 {
            return Err(BookingError::validation(
                "Invalid seat selection for this cinema",
            ));
        }

        let taken = self
            .catalog
            .booked_seat_ids(showtime_id, Some(seat_ids))
            .await?;
        if !taken.is_empty() {
            return Err(BookingError::conflict("Some seats are already booked"));
        }

        let total = total_price(showtime.price, seat_ids.len());

        let seats = seat_ids.to_vec();
        let booking_id = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let booking_id = insert_booking(tx, user_id, showtime_id, total).await?;
                    insert_booking_seats(tx, booking_id, &seats).await?;
                    Ok(booking_id)
                })
            })
            .await?;

        self.detail(booking_id).await
    }

    /// Confirms payment on a pending booking: the booking turns `complete`,
    /// its seats turn `booked`, one earn entry lands in the points ledger
    /// and the user's balance moves by the same amount — all in one
    /// transaction, exactly once.
    pub async fn confirm(&self, booking_id: i64) -> Result<BookingDetail, BookingError> {
        let booking = self.require_booking(booking_id).await?;

        let next = fsm::apply(booking.payment_status, Transition::Confirm)?;
        let points = points_earned(booking.total_price);
        let user_id = booking.user_id;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    set_booking_status(tx, booking_id, next).await?;
                    set_seat_status(tx, booking_id, SeatStatus::Booked).await?;
                    points::insert_entry(tx, user_id, Some(booking_id), PointType::Earn, points)
                        .await?;
                    adjust_points(tx, user_id, points).await?;
                    Ok(())
                })
            })
            .await?;

        self.detail(booking_id).await
    }

    /// Cancels a booking while cancellation is still meaningful: the
    /// showtime has not started and the booking is still pending. The
    /// booking row stays behind as a cancelled record; its seat rows are
    /// deleted, releasing the seats immediately.
    pub async fn cancel(&self, booking_id: i64) -> Result<BookingDetail, BookingError> {
        let booking = self.require_booking(booking_id).await?;

        let showtime = self
            .catalog
            .showtime(booking.showtime_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Showtime not found"))?;

        if showtime.start_time <= Utc::now() {
            return Err(BookingError::business_rule(
                "Cannot cancel booking for past showtime",
            ));
        }

        let next = fsm::apply(booking.payment_status, Transition::Cancel)?;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    set_booking_status(tx, booking_id, next).await?;
                    delete_booking_seats(tx, booking_id).await?;
                    Ok(())
                })
            })
            .await?;

        self.detail(booking_id).await
    }

    pub async fn require_booking(&self, booking_id: i64) -> Result<Booking, BookingError> {
        get_booking(self.store.pool(), booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking not found"))
    }

    /// Assembles the nested projection of one booking.
    pub async fn detail(&self, booking_id: i64) -> Result<BookingDetail, BookingError> {
        let booking = self.require_booking(booking_id).await?;

        let user = sqlx::query_as::<_, BookingUser>("SELECT name, email FROM users WHERE id = $1")
            .bind(booking.user_id)
            .fetch_one(self.store.pool())
            .await?;

        let showtime = self
            .catalog
            .showtime(booking.showtime_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Showtime not found"))?;

        let seats = sqlx::query_as::<_, BookedSeat>(
            r#"SELECT bs.seat_id, s.seat_number, bs.status
               FROM booking_seats bs
               JOIN seats s ON s.id = bs.seat_id
               WHERE bs.booking_id = $1
               ORDER BY s.seat_number"#,
        )
        .bind(booking_id)
        .fetch_all(self.store.pool())
        .await?;

        let payment = sqlx::query_as::<_, Payment>(
            "SELECT id, booking_id, method, status, paid_at FROM payments WHERE booking_id = $1 LIMIT 1",
        )
        .bind(booking_id)
        .fetch_optional(self.store.pool())
        .await?;

        let points_transactions = sqlx::query_as::<_, PointsTransaction>(
            r#"SELECT id, user_id, booking_id, point_type, points, created_at
               FROM points_transactions
               WHERE booking_id = $1
               ORDER BY created_at"#,
        )
        .bind(booking_id)
        .fetch_all(self.store.pool())
        .await?;

        Ok(BookingDetail {
            booking,
            user,
            showtime,
            seats,
            payment,
            points_transactions,
        })
    }

    /// Paginated booking rows, newest first, optionally filtered by user
    /// and/or status.
    pub async fn list(
        &self,
        page: u32,
        limit: u32,
        user_id: Option<i64>,
        status: Option<BookingStatus>,
    ) -> Result<(Vec<Booking>, u64), BookingError> {
        validate_pagination(page, limit)?;
        let offset = (page as i64 - 1) * limit as i64;

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT id, user_id, showtime_id, total_price, payment_status, created_at \
             FROM bookings WHERE TRUE",
        );
        if let Some(user_id) = user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(status) = status {
            query.push(" AND payment_status = ").push_bind(status);
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let bookings = query
            .build_query_as::<Booking>()
            .fetch_all(self.store.pool())
            .await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings WHERE TRUE");
        if let Some(user_id) = user_id {
            count.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(status) = status {
            count.push(" AND payment_status = ").push_bind(status);
        }
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.store.pool())
            .await?;

        Ok((bookings, total as u64))
    }

    /// A user's bookings; the user must exist.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Booking>, u64), BookingError> {
        self.users.require(user_id).await?;
        self.list(page, limit, Some(user_id), None).await
    }
}

async fn insert_booking(
    tx: &mut PgTx,
    user_id: i64,
    showtime_id: i64,
    total_price: i64,
) -> Result<i64, BookingError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"INSERT INTO bookings (user_id, showtime_id, total_price, payment_status)
           VALUES ($1, $2, $3, 'pending')
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(showtime_id)
    .bind(total_price)
    .fetch_one(tx.as_mut())
    .await?;
    Ok(id)
}

async fn insert_booking_seats(
    tx: &mut PgTx,
    booking_id: i64,
    seat_ids: &[i64],
) -> Result<(), BookingError> {
    sqlx::query(
        r#"INSERT INTO booking_seats (booking_id, seat_id, status)
           SELECT $1, seat_id, 'selected'::seat_status FROM UNNEST($2::BIGINT[]) AS seat_id"#,
    )
    .bind(booking_id)
    .bind(seat_ids)
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

pub(crate) async fn set_booking_status(
    tx: &mut PgTx,
    booking_id: i64,
    status: BookingStatus,
) -> Result<(), BookingError> {
    let res = sqlx::query("UPDATE bookings SET payment_status = $2 WHERE id = $1")
        .bind(booking_id)
        .bind(status)
        .execute(tx.as_mut())
        .await?;
    if res.rows_affected() == 0 {
        return Err(BookingError::Db(sqlx::Error::RowNotFound));
    }
    Ok(())
}

pub(crate) async fn set_seat_status(
    tx: &mut PgTx,
    booking_id: i64,
    status: SeatStatus,
) -> Result<(), BookingError> {
    sqlx::query("UPDATE booking_seats SET status = $2 WHERE booking_id = $1")
        .bind(booking_id)
        .bind(status)
        .execute(tx.as_mut())
        .await?;
    Ok(())
}

pub(crate) async fn delete_booking_seats(
    tx: &mut PgTx,
    booking_id: i64,
) -> Result<(), BookingError> {
    sqlx::query("DELETE FROM booking_seats WHERE booking_id = $1")
        .bind(booking_id)
        .execute(tx.as_mut())
        .await?;
    Ok(())
}

pub(crate) async fn get_booking(
    pool: &PgPool,
    booking_id: i64,
) -> Result<Option<Booking>, BookingError> {
    let booking = sqlx::query_as::<_, Booking>(
        r#"SELECT id, user_id, showtime_id, total_price, payment_status, created_at
           FROM bookings WHERE id = $1"#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?;
    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_is_per_seat_times_count() {
        assert_eq!(total_price(45_000, 2), 90_000);
        assert_eq!(total_price(45_000, 1), 45_000);
    }

    #[test]
    fn points_are_floor_of_price_over_thousand() {
        assert_eq!(points_earned(90_000), 90);
        assert_eq!(points_earned(45_999), 45);
        assert_eq!(points_earned(999), 0);
    }

    #[test]
    fn pagination_bounds_are_enforced() {
        assert!(validate_pagination(1, 10).is_ok());
        assert!(validate_pagination(1, 100).is_ok());

        for (page, limit) in [(0, 10), (1, 0), (1, 101)] {
            let err = validate_pagination(page, limit).unwrap_err();
            assert!(matches!(err, BookingError::Validation(_)));
        }
    }
}
