//! Read-only lookups over the showtime/cinema/seat catalog. The booking
//! workflow consumes this port; nothing here writes.

use sqlx::PgPool;

use crate::error::BookingError;
use crate::types::{Cinema, Seat, SeatAvailability, ShowtimeSummary};

#[derive(Clone)]
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Showtime joined with its cinema (incl. per-seat price), movie title
    /// and theater name.
    pub async fn showtime(&self, id: i64) -> Result<Option<ShowtimeSummary>, BookingError> {
        let showtime = sqlx::query_as::<_, ShowtimeSummary>(
            r#"SELECT s.id, s.movie_id, s.cinema_id, s.start_time,
                      c.price, m.title AS movie_title, c.cinema_type, t.name AS theater_name
               FROM showtimes s
               JOIN cinemas c ON c.id = s.cinema_id
               JOIN movies m ON m.id = s.movie_id
               JOIN theaters t ON t.id = c.theater_id
               WHERE s.id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(showtime)
    }

    pub async fn cinema(&self, id: i64) -> Result<Option<Cinema>, BookingError> {
        let cinema = sqlx::query_as::<_, Cinema>(
            "SELECT id, theater_id, cinema_type, price, total_seats FROM cinemas WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cinema)
    }

    pub async fn cinema_seats(&self, cinema_id: i64) -> Result<Vec<Seat>, BookingError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, cinema_id, seat_number FROM seats WHERE cinema_id = $1 ORDER BY seat_number",
        )
        .bind(cinema_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    /// How many of `seat_ids` exist in the given cinema. Callers compare the
    /// count against the request length; a shortfall covers both unknown
    /// seats and seats of another cinema.
    pub async fn count_cinema_seats(
        &self,
        cinema_id: i64,
        seat_ids: &[i64],
    ) -> Result<i64, BookingError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM seats WHERE cinema_id = $1 AND id = ANY($2)",
        )
        .bind(cinema_id)
        .bind(seat_ids)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Seat ids held by `complete` bookings on the showtime, optionally
    /// restricted to a candidate set. Pending bookings do not count: only a
    /// completed payment takes a seat off the market.
    pub async fn booked_seat_ids(
        &self,
        showtime_id: i64,
        among: Option<&[i64]>,
    ) -> Result<Vec<i64>, BookingError> {
        let ids = match among {
            Some(seat_ids) => {
                sqlx::query_scalar::<_, i64>(
                    r#"SELECT bs.seat_id
                       FROM booking_seats bs
                       JOIN bookings b ON b.id = bs.booking_id
                       WHERE b.showtime_id = $1
                         AND b.payment_status = 'complete'
                         AND bs.seat_id = ANY($2)"#,
                )
                .bind(showtime_id)
                .bind(seat_ids)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    r#"SELECT bs.seat_id
                       FROM booking_seats bs
                       JOIN bookings b ON b.id = bs.booking_id
                       WHERE b.showtime_id = $1
                         AND b.payment_status = 'complete'"#,
                )
                .bind(showtime_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(ids)
    }

    /// A cinema's seats flagged with availability for a showtime. Without a
    /// showtime every seat reads available.
    pub async fn available_seats(
        &self,
        cinema_id: i64,
        showtime_id: Option<i64>,
    ) -> Result<(Cinema, Vec<SeatAvailability>), BookingError> {
        let cinema = self
            .cinema(cinema_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Cinema not found"))?;

        let booked = match showtime_id {
            Some(showtime_id) => self.booked_seat_ids(showtime_id, None).await?,
            None => Vec::new(),
        };

        let seats = self
            .cinema_seats(cinema_id)
            .await?
            .into_iter()
            .map(|seat| SeatAvailability {
                is_available: !booked.contains(&seat.id),
                id: seat.id,
                seat_number: seat.seat_number,
            })
            .collect();

        Ok((cinema, seats))
    }
}
