//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};
use recollect::config::RecollectConfig;
use recollect::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &RecollectConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `recollect init` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Recollect Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.openai.embedding_model);
    if let Some(ref stored) = report.embedding_model {
        if stored != &config.openai.embedding_model {
            println!("  WARNING: model mismatch! Stored memories were embedded with another model.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    println!("Credentials:");
    println!("  OpenAI key:      {}", presence(&config.openai.api_key));
    println!("  UltraMsg token:  {}", presence(&config.delivery.token));
    println!();
    println!("Row counts:");
    println!("  Turns:           {}", report.turn_count);
    println!("  Summaries:       {}", report.summary_count);
    println!("  Tone profiles:   {}", report.tone_rule_count);
    println!("  Memories:        {}", report.vector_record_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Restore from a backup: cp backup.db {}", db_path.display());
    }

    Ok(())
}

fn presence(value: &str) -> &'static str {
    if value.is_empty() {
        "missing"
    } else {
        "set"
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
