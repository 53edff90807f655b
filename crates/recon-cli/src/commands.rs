use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;

use recon_archive::{merge_archives, ArchiveMergeReport};
use recon_merge::{merge_store_files, StoreMergeReport, TableMergeKind};
use recon_server::{ReconServer, ServerConfig};
use recon_tree::{MergeLayout, Orchestrator, TreeConfig, TreeMergeReport};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli { command, config, format, .. } = cli;
    let config = load_config(config.as_deref())?;
    match command {
        Command::MergeStores(args) => cmd_merge_stores(args, &config, &format),
        Command::MergeTrees(args) => cmd_merge_trees(args, config, &format),
        Command::MergeArchives(args) => cmd_merge_archives(args, &config, &format),
        Command::Serve(args) => cmd_serve(args, config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TreeConfig> {
    match path {
        Some(path) => TreeConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(TreeConfig::default()),
    }
}

fn cmd_merge_stores(args: MergeStoresArgs, config: &TreeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let report = merge_store_files(&args.primary, &args.secondary, &args.output, &config.merge)
        .with_context(|| format!("merging {} and {}", args.primary.display(), args.secondary.display()))?;
    emit(format, &report, print_store_report)
}

fn cmd_merge_trees(args: MergeTreesArgs, mut config: TreeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    if args.keep_primary {
        config.cleanup.remove_primary = false;
        config.cleanup.replace_primary = false;
    }
    if args.remove_secondary {
        config.cleanup.remove_secondary = true;
    }
    let layout = MergeLayout::new(
        &args.primary,
        &args.secondary,
        args.output.unwrap_or_else(|| sibling(&args.primary, "merged")),
        args.workspace.unwrap_or_else(|| sibling(&args.primary, "recon-work")),
    );

    let report = Orchestrator::new(config).run(&layout)?;
    emit(format, &report, print_tree_report)
}

fn cmd_merge_archives(args: MergeArchivesArgs, config: &TreeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let workspace = args.workspace.unwrap_or_else(std::env::temp_dir);
    let report = merge_archives(&args.primary, &args.secondary, &args.output, &workspace, config)?;
    emit(format, &report, print_archive_report)
}

fn cmd_serve(args: ServeArgs, tree: TreeConfig) -> anyhow::Result<()> {
    let mut config = ServerConfig { tree, ..ServerConfig::default() };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(root) = args.root {
        config.workspace_root = root;
    }
    println!(
        "recon server on {} (workspace: {})",
        config.bind_addr.to_string().bold(),
        config.workspace_root.display()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(ReconServer::new(config).serve())?;
    Ok(())
}

/// `<dir>.<suffix>` next to `dir`.
fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir.file_name().unwrap_or(dir.as_os_str()).to_os_string();
    name.push(".");
    name.push(suffix);
    dir.with_file_name(name)
}

fn emit<T: Serialize>(format: &OutputFormat, report: &T, text: fn(&T)) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => text(report),
    }
    Ok(())
}

fn kind_label(kind: TableMergeKind) -> colored::ColoredString {
    match kind {
        TableMergeKind::Merged => "merged".green(),
        TableMergeKind::Copied => "copied".cyan(),
        TableMergeKind::FallbackCopied => "fallback".yellow(),
        TableMergeKind::DeletionLogUnion => "log-union".blue(),
    }
}

fn print_store_report(report: &StoreMergeReport) {
    println!("{} Merged {} + {} -> {}", "✓".green().bold(), report.primary, report.secondary, report.output.bold());
    println!("  Tombstones: {}", report.tombstones);
    for t in &report.tables {
        println!(
            "  {:<28} {:<10} {} rows ({} primary, {} secondary, {} dropped)",
            t.table, kind_label(t.kind), t.rows_written, t.from_primary, t.from_secondary, t.discarded()
        );
    }
    for name in &report.ignored_tables {
        println!("  {} {} (only in secondary, not copied)", "!".yellow(), name);
    }
}

fn print_tree_report(report: &TreeMergeReport) {
    println!(
        "{} Merged {} + {} -> {}",
        "✓".green().bold(),
        report.layout.primary.display(),
        report.layout.secondary.display(),
        report.final_location.display().to_string().bold()
    );
    println!(
        "  Files: {} ({} primary, {} secondary)",
        report.files_written, report.from_primary, report.from_secondary
    );
    for store in &report.stores {
        println!("  Store {} ({} rows)", store.output.cyan(), store.rows_written());
    }
}

fn print_archive_report(report: &ArchiveMergeReport) {
    print_tree_report(&report.tree);
    println!("  Bundle: {} ({} files)", report.output.display().to_string().bold(), report.files_packed);
}
