use super::DbCommand;
use clutch_config::HarvestConfig;
use clutch_core::db::DbOps;
use clutch_sqlite::SqliteDb;
use std::fs;

pub async fn db_command(
    command: &DbCommand,
    config: &HarvestConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        DbCommand::Drop => drop_db(config),
        DbCommand::Reset => reset_db(config),
        DbCommand::Quarantine { limit } => show_quarantine(config, *limit),
    }
}

/// Delete the database file.
fn drop_db(config: &HarvestConfig) -> Result<(), Box<dyn std::error::Error>> {
    if fs::metadata(&config.db_path).is_ok() {
        fs::remove_file(&config.db_path)?;
        println!("Database file '{}' has been deleted.", config.db_path);
    } else {
        println!("Database file '{}' does not exist.", config.db_path);
    }
    Ok(())
}

/// Drop the database and recreate an empty schema.
fn reset_db(config: &HarvestConfig) -> Result<(), Box<dyn std::error::Error>> {
    drop_db(config)?;
    let db = SqliteDb::from_file(&config.db_path)?;
    db.migrate()?;
    println!("Database has been reset at version {}.", db.version());
    Ok(())
}

/// The quarantine table is the audit surface for everything validation
/// rejected; this prints the most recent entries.
fn show_quarantine(config: &HarvestConfig, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteDb::from_file(&config.db_path)?;
    db.migrate()?;
    let total = db.quarantine_count()?;
    println!("{total} quarantined records");
    for entry in db.recent_quarantine(limit)? {
        println!(
            "[{}] match={} map={} error={}",
            entry.entity_type,
            entry
                .match_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_owned()),
            entry
                .map_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_owned()),
            entry.error,
        );
    }
    Ok(())
}
