use sea_orm::SqlxPostgresConnector;

use crate::db::{DbPool, OrmConn};
use crate::pricing::DeliveryPolicy;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub delivery: DeliveryPolicy,
}

impl AppState {
    /// Share one Postgres pool between raw sqlx queries and SeaORM.
    pub fn from_pool(pool: DbPool, delivery: DeliveryPolicy) -> Self {
        let orm = SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone());
        Self {
            pool,
            orm,
            delivery,
        }
    }
}
