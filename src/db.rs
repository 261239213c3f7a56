/// PostgreSQL connection setup.
///
/// The connection string comes from `AppConfig::database_url` (which reads
/// `DATABASE_URL` via dotenv). `connect_and_verify` fails fast with the
/// migration command when the schema has not been applied, instead of
/// surfacing an obscure "relation does not exist" on the first query.

use postgres::{Client, NoTls};
use thiserror::Error;

/// Tables created by `sql/001_aquawatch_schema.sql`.
pub const REQUIRED_TABLES: &[&str] = &["water_bodies", "measurements"];

#[derive(Debug, Error)]
pub enum DbSetupError {
    #[error("failed to connect to database: {0}")]
    Connect(#[from] postgres::Error),

    #[error(
        "database is missing tables {0:?}; apply the schema with:\n  \
         psql -d <database> -f sql/001_aquawatch_schema.sql"
    )]
    MissingTables(Vec<String>),
}

pub fn connect(url: &str) -> Result<Client, postgres::Error> {
    Client::connect(url, NoTls)
}

/// Connects and checks that every table in `REQUIRED_TABLES` exists.
pub fn connect_and_verify(url: &str) -> Result<Client, DbSetupError> {
    let mut client = connect(url)?;
    let missing = missing_tables(&mut client, REQUIRED_TABLES)?;
    if !missing.is_empty() {
        return Err(DbSetupError::MissingTables(missing));
    }
    Ok(client)
}

fn missing_tables(client: &mut Client, tables: &[&str]) -> Result<Vec<String>, postgres::Error> {
    let mut missing = Vec::new();
    for table in tables {
        let row = client.query_one("SELECT to_regclass($1) IS NOT NULL", &[table])?;
        let exists: bool = row.get(0);
        if !exists {
            missing.push((*table).to_string());
        }
    }
    Ok(missing)
}
