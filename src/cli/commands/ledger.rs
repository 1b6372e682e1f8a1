//! Skip ledger commands.

use tokio::runtime::Runtime;

use crate::config::Config;
use crate::db::{self, SkipLedger, SkipRecord, SqliteLedger};
use crate::model::MediaCategory;
use crate::pipeline::{Pipeline, PipelineContext};

async fn open_ledger(config: &Config) -> anyhow::Result<SqliteLedger> {
    let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;
    Ok(SqliteLedger::new(pool))
}

/// List skip entries, optionally for one category.
pub fn cmd_skipped_list(
    rt: &Runtime,
    config: &Config,
    category: Option<MediaCategory>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let ledger = open_ledger(config).await?;
        let records = ledger.list(category).await?;
        if records.is_empty() {
            println!("Nothing skipped.");
            return Ok(());
        }

        println!("{:>9}  {:<5}  {:<9}  {:<24}  name", "tmdb", "type", "reprocess", "group");
        for record in &records {
            println!("{}", format_row(record));
        }
        println!();
        println!("{} entries", records.len());
        Ok(())
    })
}

fn format_row(record: &SkipRecord) -> String {
    format!(
        "{:>9}  {:<5}  {:<9}  {:<24}  {}",
        record.tmdb_id,
        record.category.as_str(),
        if record.reprocess { "yes" } else { "no" },
        record.group_name,
        record.name
    )
}

/// Allow (`reprocess = true`) or deny an entry on later runs.
pub fn cmd_skipped_set(
    rt: &Runtime,
    config: &Config,
    tmdb_id: i64,
    allow: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let ledger = open_ledger(config).await?;
        if !ledger.set_reprocess(tmdb_id, allow).await? {
            anyhow::bail!("no ledger entry for tmdb {tmdb_id}");
        }
        if allow {
            println!("tmdb {tmdb_id} will be processed on the next run");
        } else {
            println!("tmdb {tmdb_id} is skipped again");
        }
        Ok(())
    })
}

/// Reprocess one entry right away.
pub fn cmd_reprocess(rt: &Runtime, config: Config, tmdb_id: i64) -> anyhow::Result<()> {
    rt.block_on(async {
        let context = PipelineContext::from_config(config).await?;
        let pipeline = Pipeline::new(context);
        match pipeline.reprocess(tmdb_id).await? {
            Some(stats) => println!("Reprocessed tmdb {tmdb_id}: {stats}"),
            None => anyhow::bail!("no ledger entry for tmdb {tmdb_id}"),
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row() {
        let record = SkipRecord {
            tmdb_id: 42,
            dispatcharr_id: 7,
            category: MediaCategory::Episode,
            group_name: "Drama Series".into(),
            name: "Dark".into(),
            reprocess: true,
        };
        let row = format_row(&record);
        assert!(row.trim_start().starts_with("42  tv"));
        assert!(row.contains("yes"));
        assert!(row.ends_with("Dark"));
    }

    #[test]
    fn test_set_unknown_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("ledger.db");
        let rt = Runtime::new().unwrap();

        let result = cmd_skipped_set(&rt, &config, 99, true);
        assert!(result.is_err());
        assert!(cmd_skipped_list(&rt, &config, None).is_ok());
    }
}
