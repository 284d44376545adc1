use diesel::{Connection, ConnectionError};
use diesel_tracing::pg::InstrumentedPgConnection;
use mobc::{async_trait, Manager, Pool};

pub struct PgConnectionManager {
    database_url: String,
}

#[async_trait]
impl Manager for PgConnectionManager {
    type Connection = InstrumentedPgConnection;
    type Error = ConnectionError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        InstrumentedPgConnection::establish(&self.database_url)
    }

    async fn check(&self, conn: Self::Connection) -> Result<Self::Connection, Self::Error> {
        Ok(conn)
    }
}

pub fn establish_connection_pool(database_url: &str) -> Pool<PgConnectionManager> {
    Pool::new(PgConnectionManager {
        database_url: database_url.into(),
    })
}
