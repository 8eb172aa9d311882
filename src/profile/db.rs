use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

use crate::descriptor::Descriptor;
use crate::error::SyncError;
use crate::store::{plan_replacement, Materialized, ProfileStore};

use super::Profile;

const SELECT_PROFILE: &str = r#"
    SELECT id, name, host, remote_port, password, protocol, protocol_param,
           method, obfs, obfs_param, url_group, route, remote_dns, ipv6
    FROM subsync.profile
"#;

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        PgProfileStore { pool }
    }
}

// Binds the descriptor columns as $1..$13, in table order.
fn bind_descriptor<'q>(q: Query<'q, Postgres, PgArguments>, d: &'q Descriptor) -> Query<'q, Postgres, PgArguments> {
    q.bind(&d.name)
        .bind(&d.host)
        .bind(d.remote_port)
        .bind(&d.password)
        .bind(&d.protocol)
        .bind(&d.protocol_param)
        .bind(&d.method)
        .bind(&d.obfs)
        .bind(&d.obfs_param)
        .bind(&d.url_group)
        .bind(&d.route)
        .bind(&d.remote_dns)
        .bind(d.ipv6)
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get(&self, id: i64) -> Result<Option<Profile>, SyncError> {
        let sql = format!("{} WHERE id = $1", SELECT_PROFILE);
        sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SyncError::from_sqlx)
    }

    async fn list_by_group(&self, group: &str) -> Result<Vec<Profile>, SyncError> {
        let sql = format!("{} WHERE url_group = $1 ORDER BY id", SELECT_PROFILE);
        sqlx::query_as::<_, Profile>(&sql)
            .bind(group)
            .fetch_all(&self.pool)
            .await
            .map_err(SyncError::from_sqlx)
    }

    async fn delete_all(&self, profiles: &[Profile]) -> Result<u64, SyncError> {
        if profiles.is_empty() { return Ok(0); }
        let ids: Vec<i64> = profiles.iter().map(|p| p.id).collect();
        let res = sqlx::query("DELETE FROM subsync.profile WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(SyncError::from_sqlx)?;
        Ok(res.rows_affected())
    }

    async fn materialize_for_group(&self, group: &str, descriptors: &[Descriptor]) -> Result<Materialized, SyncError> {
        // one transaction: readers see either the old generation or the new one
        let mut tx = self.pool.begin().await.map_err(SyncError::from_sqlx)?;

        let sql = format!("{} WHERE url_group = $1 ORDER BY id FOR UPDATE", SELECT_PROFILE);
        let existing = sqlx::query_as::<_, Profile>(&sql)
            .bind(group)
            .fetch_all(&mut *tx)
            .await
            .map_err(SyncError::from_sqlx)?;

        let plan = plan_replacement(group, &existing, descriptors);

        if !plan.remove.is_empty() {
            sqlx::query("DELETE FROM subsync.profile WHERE id = ANY($1)")
                .bind(&plan.remove)
                .execute(&mut *tx)
                .await
                .map_err(SyncError::from_sqlx)?;
        }

        for (id, d) in &plan.keep {
            let q = sqlx::query(
                r#"
                UPDATE subsync.profile
                   SET name = $1, host = $2, remote_port = $3, password = $4,
                       protocol = $5, protocol_param = $6, method = $7, obfs = $8,
                       obfs_param = $9, url_group = $10, route = $11,
                       remote_dns = $12, ipv6 = $13
                 WHERE id = $14
                "#,
            );
            let res = bind_descriptor(q, d).bind(*id).execute(&mut *tx).await.map_err(SyncError::from_sqlx)?;
            if res.rows_affected() != 1 {
                return Err(SyncError::StorageInvariantViolation(format!("profile {} vanished during replacement", id)));
            }
        }

        for d in &plan.insert {
            let q = sqlx::query(
                r#"
                INSERT INTO subsync.profile (name, host, remote_port, password,
                    protocol, protocol_param, method, obfs, obfs_param, url_group,
                    route, remote_dns, ipv6)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            );
            bind_descriptor(q, d)
                .execute(&mut *tx)
                .await
                .map_err(SyncError::from_sqlx)?;
        }

        tx.commit().await.map_err(SyncError::from_sqlx)?;
        Ok(plan.summary())
    }
}
