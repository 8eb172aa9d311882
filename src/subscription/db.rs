use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::SyncError;
use crate::store::SubscriptionStore;

use super::types::{SubStatus, Subscription};

#[derive(sqlx::FromRow)]
struct SubRow {
    id: i64,
    url: String,
    url_group: String,
    status: i16,
}

impl TryFrom<SubRow> for Subscription {
    type Error = SyncError;

    fn try_from(r: SubRow) -> Result<Self, Self::Error> {
        let status = SubStatus::from_code(r.status)
            .ok_or_else(|| SyncError::Storage(format!("subscription {} has unknown status code {}", r.id, r.status)))?;
        Ok(Subscription { id: r.id, url: r.url, url_group: r.url_group, status })
    }
}

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        PgSubscriptionStore { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn create(&self, sub: &Subscription) -> Result<i64, SyncError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO subsync.subscription (url, url_group, status)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&sub.url)
        .bind(&sub.url_group)
        .bind(sub.status.code())
        .fetch_one(&self.pool)
        .await
        .map_err(SyncError::from_sqlx)?;
        Ok(id)
    }

    async fn update(&self, sub: &Subscription) -> Result<u64, SyncError> {
        let res = sqlx::query(
            r#"
            UPDATE subsync.subscription
               SET url = $2, url_group = $3, status = $4, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(sub.id)
        .bind(&sub.url)
        .bind(&sub.url_group)
        .bind(sub.status.code())
        .execute(&self.pool)
        .await
        .map_err(SyncError::from_sqlx)?;
        Ok(res.rows_affected())
    }

    async fn get(&self, id: i64) -> Result<Option<Subscription>, SyncError> {
        let row = sqlx::query_as::<_, SubRow>("SELECT id, url, url_group, status FROM subsync.subscription WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SyncError::from_sqlx)?;
        row.map(Subscription::try_from).transpose()
    }

    async fn delete(&self, id: i64) -> Result<u64, SyncError> {
        let res = sqlx::query("DELETE FROM subsync.subscription WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(SyncError::from_sqlx)?;
        Ok(res.rows_affected())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, SyncError> {
        let rows = sqlx::query_as::<_, SubRow>("SELECT id, url, url_group, status FROM subsync.subscription ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(SyncError::from_sqlx)?;
        rows.into_iter().map(Subscription::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_code_is_rejected() {
        let row = SubRow { id: 5, url: "https://x".into(), url_group: "X".into(), status: 42 };
        assert!(matches!(Subscription::try_from(row), Err(SyncError::Storage(_))));
    }

    #[test]
    fn row_maps_to_subscription() {
        let row = SubRow { id: 5, url: "https://x".into(), url_group: "X".into(), status: 3 };
        let sub = Subscription::try_from(row).unwrap();
        assert_eq!(sub.status, SubStatus::NameChanged);
        assert_eq!(sub.id, 5);
    }
}
