//! Reporter accounts
//!
//! Account management lives in another service; this crate only needs to
//! check that a reporter exists and to seed accounts in tests.

use sqlx::{Executor, Sqlite};
use wastewatch_common::Result;

pub async fn user_exists<'c, E>(executor: E, user_id: i64) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

pub async fn create_user<'c, E>(executor: E, username: &str, email: Option<&str>) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("INSERT INTO users (username, email) VALUES (?, ?)")
        .bind(username)
        .bind(email)
        .execute(executor)
        .await?;
    Ok(result.last_insert_rowid())
}
