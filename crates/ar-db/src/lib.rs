//! PostgreSQL persistence for the announcement service.
//!
//! [`PgStore`] implements the core's [`AnnounceStore`] seam. The free
//! functions below cover the writes owned by the registration, heartbeat and
//! content-ingestion subsystems; the daemon and tests use them to seed rows.

use anyhow::{anyhow, Context, Result};
use ar_announce::AnnounceStore;
use ar_schemas::{ContentRecord, FrontEndRegistration};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cid::Cid;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

pub const ENV_DB_URL: &str = "AR_DATABASE_URL";

/// Connect to Postgres using AR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_autoretrieves_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='autoretrieves'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_autoretrieves_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

const FRONT_END_COLUMNS: &str = "id, handle, token, private_key, addresses, \
     last_connection, last_advertisement, created_at, updated_at";

fn front_end_from_row(row: &PgRow) -> Result<FrontEndRegistration> {
    Ok(FrontEndRegistration {
        id: row.try_get("id")?,
        handle: row.try_get("handle")?,
        token: row.try_get("token")?,
        private_key: row.try_get("private_key")?,
        addresses: row.try_get("addresses")?,
        last_connection: row.try_get("last_connection")?,
        last_advertisement: row.try_get("last_advertisement")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn content_from_row(row: &PgRow) -> Result<ContentRecord> {
    let id: i64 = row.try_get("id")?;
    let raw: Vec<u8> = row.try_get("cid")?;
    let cid = Cid::try_from(raw.as_slice()).map_err(|e| anyhow!("content {id}: bad cid bytes: {e}"))?;
    Ok(ContentRecord {
        id,
        cid,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

// ---------------------------------------------------------------------------
// Record helpers (writes owned by other subsystems)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewFrontEnd {
    pub handle: String,
    pub token: String,
    pub private_key: String,
    pub addresses: String,
    pub last_connection: DateTime<Utc>,
    pub last_advertisement: DateTime<Utc>,
}

/// Insert a registration row; returns its id.
pub async fn insert_front_end(pool: &PgPool, fe: &NewFrontEnd) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        insert into autoretrieves (
          handle, token, private_key, addresses, last_connection, last_advertisement
        ) values (
          $1, $2, $3, $4, $5, $6
        )
        returning id
        "#,
    )
    .bind(&fe.handle)
    .bind(&fe.token)
    .bind(&fe.private_key)
    .bind(&fe.addresses)
    .bind(fe.last_connection)
    .bind(fe.last_advertisement)
    .fetch_one(pool)
    .await
    .with_context(|| format!("insert_front_end failed for handle={}", fe.handle))?;
    Ok(id)
}

/// Heartbeat: refresh `last_connection` and the advertised addresses.
/// Returns false when no row matched the token.
pub async fn record_heartbeat(
    pool: &PgPool,
    token: &str,
    addresses: &str,
    at: DateTime<Utc>,
) -> Result<bool> {
    let res = sqlx::query(
        r#"
        update autoretrieves
           set last_connection = $2, addresses = $3, updated_at = now()
         where token = $1
        "#,
    )
    .bind(token)
    .bind(at)
    .bind(addresses)
    .execute(pool)
    .await
    .context("record_heartbeat failed")?;
    Ok(res.rows_affected() == 1)
}

pub async fn insert_content(
    pool: &PgPool,
    cid: &Cid,
    active: bool,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        insert into contents (cid, active, created_at)
        values ($1, $2, $3)
        returning id
        "#,
    )
    .bind(cid.to_bytes())
    .bind(active)
    .bind(created_at)
    .fetch_one(pool)
    .await
    .with_context(|| format!("insert_content failed for cid={cid}"))?;
    Ok(id)
}

pub async fn set_content_active(pool: &PgPool, id: i64, active: bool) -> Result<()> {
    sqlx::query("update contents set active = $2, updated_at = now() where id = $1")
        .bind(id)
        .bind(active)
        .execute(pool)
        .await
        .with_context(|| format!("set_content_active failed for id={id}"))?;
    Ok(())
}

/// Every registration regardless of liveness, id order.
pub async fn list_all_front_ends(pool: &PgPool) -> Result<Vec<FrontEndRegistration>> {
    let rows = sqlx::query(&format!(
        "select {FRONT_END_COLUMNS} from autoretrieves order by id"
    ))
    .fetch_all(pool)
    .await
    .context("list_all_front_ends failed")?;
    rows.iter().map(front_end_from_row).collect()
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AnnounceStore for PgStore {
    async fn list_front_ends(
        &self,
        last_connection_after: DateTime<Utc>,
    ) -> Result<Vec<FrontEndRegistration>> {
        let rows = sqlx::query(&format!(
            "select {FRONT_END_COLUMNS} from autoretrieves where last_connection > $1 order by id"
        ))
        .bind(last_connection_after)
        .fetch_all(&self.pool)
        .await
        .context("list_front_ends failed")?;
        rows.iter().map(front_end_from_row).collect()
    }

    async fn list_registrations(&self) -> Result<Vec<FrontEndRegistration>> {
        list_all_front_ends(&self.pool).await
    }

    async fn get_front_end(&self, handle: &str) -> Result<Option<FrontEndRegistration>> {
        let row = sqlx::query(&format!(
            "select {FRONT_END_COLUMNS} from autoretrieves where handle = $1"
        ))
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("get_front_end failed for handle={handle}"))?;
        row.as_ref().map(front_end_from_row).transpose()
    }

    async fn count_active_content_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
            "select count(*)::bigint from contents where active = true and created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("count_active_content_since failed")?;
        Ok(n)
    }

    async fn list_active_content_since(&self, since: DateTime<Utc>) -> Result<Vec<ContentRecord>> {
        let rows = sqlx::query(
            r#"
            select id, cid, active, created_at
            from contents
            where active = true and created_at >= $1
            order by id
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("list_active_content_since failed")?;
        rows.iter().map(content_from_row).collect()
    }

    async fn update_watermark(&self, handle: &str, at: DateTime<Utc>) -> Result<()> {
        // Scoped to one row; never moves backwards.
        let res = sqlx::query(
            r#"
            update autoretrieves
               set last_advertisement = greatest(last_advertisement, $2),
                   updated_at = now()
             where handle = $1
            "#,
        )
        .bind(handle)
        .bind(at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("update_watermark failed for handle={handle}"))?;

        if res.rows_affected() == 0 {
            tracing::warn!(handle, "update_watermark matched no front-end");
        }
        Ok(())
    }
}
