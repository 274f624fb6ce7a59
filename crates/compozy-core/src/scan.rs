//! Uniform scan entry points over `sqlx::query_as`, parametric in destination shape.
//!
//! Repositories build a `query_as::<_, T>(sql)` with whatever binds it needs, then hand
//! it to [`scan_one`] or [`scan_all`] instead of calling `fetch_optional`/`fetch_all`
//! directly, keeping every repository method's query-dispatch path uniform.

use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::query::QueryAs;
use sqlx::{Error as SqlxError, FromRow};

/// Fetch at most one row, or `Ok(None)` if the query matched nothing.
pub async fn scan_one<'q, T, A>(
    query: QueryAs<'q, Postgres, T, A>,
    pool: &PgPool,
) -> Result<Option<T>, SqlxError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    A: 'q + sqlx::IntoArguments<'q, Postgres>,
{
    query.fetch_optional(pool).await
}

/// Fetch every matching row.
pub async fn scan_all<'q, T, A>(
    query: QueryAs<'q, Postgres, T, A>,
    pool: &PgPool,
) -> Result<Vec<T>, SqlxError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    A: 'q + sqlx::IntoArguments<'q, Postgres>,
{
    query.fetch_all(pool).await
}
