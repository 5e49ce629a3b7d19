//! Persistence boundary: the pool-owning store with its all-or-nothing
//! transaction primitive, and the user-store port.

use std::future::Future;
use std::pin::Pin;

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::BookingError;
use crate::types::User;

/// A transaction handed to workflow closures. Pool transactions carry no
/// borrow of the pool, hence the 'static.
pub type PgTx = Transaction<'static, Postgres>;

/// Future returned by a transactional closure.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, BookingError>> + Send + 't>>;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `f` inside one database transaction: commit when it returns Ok,
    /// roll back on any error. Multi-row writes behind a single operation go
    /// through here so no partial state is ever visible.
    pub async fn with_transaction<T, F>(&self, f: F) -> Result<T, BookingError>
    where
        F: for<'t> FnOnce(&'t mut PgTx) -> TxFuture<'t, T>,
    {
        let mut tx = self.pool.begin().await?;
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}

/// Read/adjust port over the users table.
#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, BookingError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, phone, points, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Same as `get`, but raises NotFound when the user is absent.
    pub async fn require(&self, id: i64) -> Result<User, BookingError> {
        self.get(id)
            .await?
            .ok_or_else(|| BookingError::not_found("User not found"))
    }
}

/// Moves a user's denormalized balance by `delta` inside the caller's
/// transaction. Every ledger write pairs with exactly one call to this.
pub async fn adjust_points(tx: &mut PgTx, user_id: i64, delta: i64) -> Result<(), BookingError> {
    sqlx::query("UPDATE users SET points = points + $2 WHERE id = $1")
        .bind(user_id)
        .bind(delta)
        .execute(tx.as_mut())
        .await?;
    Ok(())
}
