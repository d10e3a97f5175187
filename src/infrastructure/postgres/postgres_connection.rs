use std::time::Duration;

use anyhow::Result;
use diesel::{
    Connection, PgConnection,
    connection::CacheSize,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};
use tracing::warn;

/// The pooler in front of Supabase Postgres runs in transaction mode.
#[derive(Debug, Default)]
struct DisablePreparedStatements;

impl CustomizeConnection<PgConnection, R2d2Error> for DisablePreparedStatements {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), R2d2Error> {
        conn.set_prepared_statement_cache_size(CacheSize::Disabled);
        Ok(())
    }
}

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

pub fn establish_connection(
    database_url: &str,
    max_size: u32,
    connection_timeout: Duration,
) -> Result<PgPoolSquad> {
    let builder = || {
        Pool::builder()
            .max_size(max_size)
            .connection_timeout(connection_timeout)
            .connection_customizer(Box::new(DisablePreparedStatements))
    };

    match builder().build(ConnectionManager::<PgConnection>::new(database_url)) {
        Ok(pool) => Ok(pool),
        Err(err) => {
            // Payments keep flowing through the local store while Postgres is down.
            warn!(error = %err, "postgres: pool not ready at startup, continuing unchecked");
            Ok(builder().build_unchecked(ConnectionManager::<PgConnection>::new(database_url)))
        }
    }
}
