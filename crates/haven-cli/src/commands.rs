use std::fs;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;

use haven_merge::{Change, ChangeType, Merger};
use haven_model::{Database, Icon};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Merge(args) => cmd_merge(args),
        Command::Show(args) => cmd_show(args),
    }
}

fn load_vault(path: &Path) -> anyhow::Result<Database> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading vault {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing vault {}", path.display()))
}

fn write_vault(path: &Path, db: &Database) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(db).context("serializing vault")?;
    fs::write(path, raw).with_context(|| format!("writing vault {}", path.display()))
}

pub(crate) fn cmd_merge(args: MergeArgs) -> anyhow::Result<()> {
    let source = load_vault(&args.source)?;
    let mut target = load_vault(&args.target)?;

    let mut merger = Merger::new(&source, &mut target);
    if let Some(mode) = args.mode {
        merger.set_forced_merge_mode(mode.into());
    }
    let changes = merger.merge()?;

    for change in &changes {
        println!("{}", render_change(change));
    }
    if changes.is_empty() {
        println!("{} Already up to date.", "✓".green());
        return Ok(());
    }

    if args.dry_run {
        println!(
            "{} {} change(s) found, nothing written (dry run).",
            "✓".green(),
            changes.len()
        );
        return Ok(());
    }

    let destination = args.output.as_deref().unwrap_or(&args.target);
    write_vault(destination, &target)?;
    println!(
        "{} Merged {} change(s) into {}.",
        "✓".green().bold(),
        changes.len(),
        destination.display().to_string().bold()
    );
    Ok(())
}

fn render_change(change: &Change) -> String {
    let rendered = change.to_string();
    match change.change_type {
        ChangeType::Added => rendered.green().to_string(),
        ChangeType::Modified => rendered.yellow().to_string(),
        ChangeType::Moved => rendered.cyan().to_string(),
        ChangeType::Deleted => rendered.red().to_string(),
        ChangeType::Unspecified => rendered.dimmed().to_string(),
    }
}

pub(crate) fn cmd_show(args: ShowArgs) -> anyhow::Result<()> {
    let db = load_vault(&args.vault)?;
    print_group(&db, db.root_uuid(), 0);
    println!(
        "{} groups, {} entries, {} tombstones",
        db.group_count(),
        db.entry_count(),
        db.deleted_objects().len()
    );
    Ok(())
}

fn print_group(db: &Database, group: uuid::Uuid, depth: usize) {
    let indent = "  ".repeat(depth);
    if let Some(g) = db.group(group) {
        println!("{indent}{} {}", g.name().bold(), format!("[{}]", g.uuid()).dimmed());
        for entry_id in db.entries_in(group) {
            if let Some(entry) = db.entry(*entry_id) {
                let marker = match entry.icon() {
                    Icon::Custom(_) => "◆",
                    Icon::Number(_) => "•",
                };
                println!(
                    "{indent}  {marker} {} {}",
                    entry.title(),
                    format!("[{}]", entry.uuid()).dimmed()
                );
            }
        }
        for child in db.groups_in(group).to_vec() {
            print_group(db, child, depth + 1);
        }
    }
}
