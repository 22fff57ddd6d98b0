//! Profile repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use toko_core::{Email, UserId};

use super::RepositoryError;
use crate::models::Profile;

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: UserId,
    email: Email,
    created_at: DateTime<Utc>,
}

/// Repository for the `profiles` table.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the profile for an email, creating it if needed.
    ///
    /// The no-op `DO UPDATE` makes `RETURNING` yield the existing row when
    /// two sign-ins race.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, email: &Email) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            INSERT INTO profiles (email)
            VALUES ($1)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email, created_at
            ",
        )
        .bind(email)
        .fetch_one(self.pool)
        .await?;

        Ok(Profile {
            id: row.id,
            email: row.email,
            created_at: row.created_at,
        })
    }
}
