use anyhow::{bail, Context, Result};
use std::env;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

// Use library instead of local modules
use creditor_resolver::{
    init_tracing, load_creditors_csv, BatchOutcome, CreditorResolver, ResolverConfig, SqliteStore,
};

fn main() -> Result<()> {
    init_tracing();
    let config = ResolverConfig::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("import") => run_import(&config, &args[1..]),
        Some("search") => run_search(&config, &args[1..]),
        Some("validate") => run_validate(&config, &args[1..]),
        Some("misses") => run_misses(&config),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("creditor-resolver {}", creditor_resolver::VERSION);
    println!();
    println!("USAGE:");
    println!("  creditor-resolver import <creditors.csv>          Replace the master alias list");
    println!("  creditor-resolver search <query>                  Substring search over codes and names");
    println!("  creditor-resolver validate <case-ref> [file] [--report]");
    println!("                                                    Exact-match a pasted batch (stdin if no file)");
    println!("  creditor-resolver misses                          List recorded unresolved codes");
    println!();
    println!("Database: CREDITOR_DB_PATH (default creditors.db)");
}

fn open_store(config: &ResolverConfig) -> Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::open(&config.database_path)?))
}

fn run_import(config: &ResolverConfig, args: &[String]) -> Result<()> {
    let Some(csv_arg) = args.first() else {
        bail!("import needs a CSV path");
    };

    println!("🗄️  Creditor import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading CSV...");
    let records = load_creditors_csv(Path::new(csv_arg))?;
    println!("✓ Loaded {} creditor aliases", records.len());

    // 2. Replace master list
    println!("\n💾 Replacing master list...");
    let store = open_store(config)?;
    let inserted = store.replace_creditors(&records)?;

    // 3. Verify count
    let count = store.count_creditors()?;
    println!("✓ Database {} contains {} aliases", config.database_path.display(), count);

    if count != inserted as i64 {
        bail!("expected {} aliases after import, found {}", inserted, count);
    }

    Ok(())
}

fn run_search(config: &ResolverConfig, args: &[String]) -> Result<()> {
    let query = args.join(" ");
    if query.trim().is_empty() {
        println!("No search performed (empty query)");
        return Ok(());
    }

    let resolver = CreditorResolver::with_sqlite(open_store(config)?, config);
    let outcome = resolver.search(&query);

    if !outcome.index_available {
        eprintln!("⚠️  Creditor list unavailable - showing no results");
    }

    println!("🔍 {} match(es) for {:?}", outcome.records.len(), query);
    for record in &outcome.records {
        println!("  {:<16} {}", record.code, record.name);
    }

    Ok(())
}

fn run_validate(config: &ResolverConfig, args: &[String]) -> Result<()> {
    let report = args.iter().any(|a| a == "--report");
    let positional: Vec<&String> = args.iter().filter(|a| a.as_str() != "--report").collect();

    let Some(case_reference) = positional.first() else {
        bail!("validate needs a case reference");
    };

    let text = match positional.get(1) {
        Some(path) => std::fs::read_to_string(path.as_str())
            .with_context(|| format!("Failed to read {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read batch from stdin")?;
            buf
        }
    };

    let resolver = CreditorResolver::with_sqlite(open_store(config)?, config);
    let outcome = if report {
        resolver.validate_and_report(&text, case_reference)
    } else {
        resolver.validate(&text, case_reference)
    };

    print_batch(&outcome);
    Ok(())
}

fn print_batch(outcome: &BatchOutcome) {
    let result = &outcome.result;

    println!("📋 Case {}: {}", result.case_reference, result.summary_line());
    if !outcome.index_available {
        eprintln!("⚠️  Creditor list unavailable - every code reported as unresolved");
    }

    if !result.hits.is_empty() {
        println!("\n✅ Matched:");
        for hit in &result.hits {
            println!(
                "  line {:<4} {:<16} → {}",
                hit.line_number, hit.record.code, hit.record.name
            );
        }
    }

    if result.has_misses() {
        println!("\n❓ Unresolved:");
        for code in &result.misses {
            println!("  {}", code);
        }
    }

    match outcome.report_saved {
        Some(true) if result.has_misses() => println!("\n✓ Unresolved codes reported"),
        Some(false) => eprintln!("\n❌ Unresolved codes could not be saved"),
        _ => {}
    }
}

fn run_misses(config: &ResolverConfig) -> Result<()> {
    let store = open_store(config)?;
    let rows = store.get_miss_records()?;

    println!("📮 {} recorded unresolved code(s)", rows.len());
    for row in &rows {
        println!(
            "  {}  {:<16} {:<20} {}",
            row.reported_at.format("%Y-%m-%d %H:%M"),
            row.code,
            row.case_reference,
            row.report_id
        );
    }

    Ok(())
}
