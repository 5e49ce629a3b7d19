//! Booking workflow service for a cinema ticketing platform: bookings hold
//! seats for a showtime, payment confirmation completes them and earns
//! loyalty points, cancellation releases the seats again.

mod api;
mod booking;
mod catalog;
mod config;
mod error;
mod fsm;
mod payments;
mod points;
mod responses;
mod store;
mod types;

use anyhow::Context;
use anyhow::Result;
pub use api::{AppState, init_router};
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};

/// One loyalty point is earned per this many currency units of a completed
/// booking's total price.
pub const POINTS_PRICE_DIVISOR: i64 = 1000;
/// Days within which a points transaction may still be voided.
pub const VOID_WINDOW_DAYS: i64 = 30;

/// Initializes the database pool.
pub async fn init_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    Ok(pool)
}
