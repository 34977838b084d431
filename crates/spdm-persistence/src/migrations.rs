//! Wrapper para correr migraciones embebidas.
//!
//! Se espera que exista un directorio `migrations/` en este crate con las
//! migraciones Diesel. Al inicializar el pool se ejecutan una vez.

use crate::error::PersistenceError;
use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<(), PersistenceError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|applied| {
            if !applied.is_empty() {
                log::info!("applied {} migration(s)", applied.len());
            }
        })
        .map_err(|e| PersistenceError::Unknown(format!("migration error: {e}")))
}
