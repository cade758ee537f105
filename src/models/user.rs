//! Owner of API keys.

/// The columns of `users` the key service reads.
///
/// Deployments may bring a wider `users` table, with an INT or BIGINT `id`,
/// as long as it has a numeric `id` primary key and a `name` column.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    pub name: String,
}
