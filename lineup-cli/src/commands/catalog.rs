//! `lineup catalog list` and `lineup catalog check`

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use lineup_core::Catalog;

use super::{load_settings, CatalogArgs};

/// Inspect catalog files.
#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Table of groups with record counts.
    List(CatalogArgs),

    /// Validate every catalog file and report the first error.
    Check(CatalogArgs),
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "group")]
    group: String,
    #[tabled(rename = "records")]
    records: usize,
    #[tabled(rename = "no channel")]
    unlinked: usize,
    #[tabled(rename = "file")]
    file: String,
}

pub fn run(cmd: CatalogCommand) -> Result<()> {
    let settings = load_settings()?;
    match cmd {
        CatalogCommand::List(args) => list(&args.load(&settings)?),
        CatalogCommand::Check(args) => {
            let catalog = args.load(&settings)?;
            println!(
                "{} catalog ok: {} groups, {} records",
                "✓".green(),
                catalog.groups.len(),
                catalog.record_count()
            );
            Ok(())
        }
    }
}

fn list(catalog: &Catalog) -> Result<()> {
    if catalog.groups.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }

    let rows: Vec<GroupRow> = catalog
        .groups
        .iter()
        .map(|g| GroupRow {
            category: g.category.clone(),
            group: g.group.clone(),
            records: g.records.len(),
            unlinked: g.unlinked_count(),
            file: g.source.display().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} groups, {} records",
        catalog.groups.len(),
        catalog.record_count()
    );
    Ok(())
}
