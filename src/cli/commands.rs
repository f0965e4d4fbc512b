//! Command dispatch
//!
//! Every ledger command opens the ledger file, applies one service call and
//! writes the file back only when the state changed.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::services::LedgerService;
use crate::cli::args::{Cli, Commands, ConfigCommands, Destination, HeirCommands, OwnerCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{config_template, global_config_path};
use crate::domain::{NodeId, ShareWarning};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli, container: &ServiceContainer) -> CliResult<()> {
    let path = container.ledger_path(cli.file.as_deref());
    debug!("ledger: {}", path.display());

    match &cli.command {
        Commands::Owner { command } => match command {
            OwnerCommands::Add { name, share } => {
                cmd_owner_add(container, &path, name, share.as_deref())
            }
            OwnerCommands::Rebalance => cmd_owner_rebalance(container, &path),
        },
        Commands::Heir { command } => match command {
            HeirCommands::Add {
                parent,
                name,
                fraction,
            } => cmd_heir_add(container, &path, parent, name, fraction),
        },
        Commands::Edit {
            node,
            name,
            relative_share,
        } => cmd_edit(container, &path, node, name, relative_share),
        Commands::Delete { node, rebalance } => cmd_delete(container, &path, node, *rebalance),
        Commands::Convey {
            source,
            destinations,
        } => cmd_convey(container, &path, source, destinations),
        Commands::Undo => cmd_undo(container, &path),
        Commands::Clear { yes } => cmd_clear(container, &path, *yes),
        Commands::Report => cmd_report(container, &path),
        Commands::Total => cmd_total(container, &path),
        Commands::Tree => cmd_tree(container, &path),
        Commands::Remainder { node } => cmd_remainder(container, &path, node),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(container),
            ConfigCommands::Path => cmd_config_path(container, &path),
            ConfigCommands::Init { force } => cmd_config_init(container, *force),
        },
        Commands::Completion { shell } => cmd_completion(*shell),
    }
}

// ============================================================
// Mutations
// ============================================================

#[instrument(skip(container))]
fn cmd_owner_add(
    container: &ServiceContainer,
    path: &Path,
    name: &str,
    share: Option<&str>,
) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    let share = share
        .map(str::to_string)
        .unwrap_or_else(|| ledger.suggested_owner_share().to_string());
    let id = ledger.add_original_owner(name, &share)?;
    container.save_ledger(&ledger, path)?;
    announce(&ledger, "Added", id)
}

#[instrument(skip(container))]
fn cmd_owner_rebalance(container: &ServiceContainer, path: &Path) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    if ledger.tree().roots().is_empty() {
        output::info("No original owners");
        return Ok(());
    }
    let warnings = ledger.rebalance_original_owners()?;
    container.save_ledger(&ledger, path)?;
    output::success(&format!(
        "{} original owner(s) now hold {} each",
        ledger.tree().roots().len(),
        ledger.tree().node(ledger.tree().roots()[0])?.share()
    ));
    print_warnings(&warnings);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_heir_add(
    container: &ServiceContainer,
    path: &Path,
    parent: &str,
    name: &str,
    fraction: &str,
) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    let parent = ledger.locate(parent)?;
    let id = ledger.add_heir(parent, name, fraction)?;
    container.save_ledger(&ledger, path)?;
    announce(&ledger, "Added", id)
}

#[instrument(skip(container))]
fn cmd_edit(
    container: &ServiceContainer,
    path: &Path,
    node: &str,
    name: &str,
    relative_share: &str,
) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    let id = ledger.locate(node)?;
    let warnings = ledger.edit_node(id, name, relative_share)?;
    container.save_ledger(&ledger, path)?;
    announce(&ledger, "Updated", id)?;
    print_warnings(&warnings);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_delete(container: &ServiceContainer, path: &Path, node: &str, rebalance: bool) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    let id = ledger.locate(node)?;
    let name = ledger.tree().node(id)?.name().to_string();
    let removed = ledger.delete_node(id)?;
    let warnings = if rebalance {
        ledger.rebalance_original_owners()?
    } else {
        Vec::new()
    };
    container.save_ledger(&ledger, path)?;
    output::action("Deleted", &format!("{node} {name} ({removed} node(s))"));
    print_warnings(&warnings);
    Ok(())
}

#[instrument(skip(container, destinations))]
fn cmd_convey(
    container: &ServiceContainer,
    path: &Path,
    source: &str,
    destinations: &[Destination],
) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    let source_id = ledger.locate(source)?;
    let mut targets: Vec<(NodeId, &str)> = Vec::with_capacity(destinations.len());
    for destination in destinations {
        targets.push((ledger.locate(&destination.address)?, destination.portion.as_str()));
    }

    let outcome = ledger.convey(source_id, &targets)?;
    container.save_ledger(&ledger, path)?;

    let precision = container.settings.precision;
    output::action(
        "Conveyed",
        &format!(
            "{} of remainder {} from {source}",
            output::share_text(&outcome.conveyed(), precision),
            outcome.remainder
        ),
    );
    for (destination, amount) in &outcome.transfers {
        output::detail(&format!(
            "{} +{}",
            ledger.tree().outline_of(*destination)?,
            amount
        ));
    }
    print_warnings(&outcome.warnings);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_undo(container: &ServiceContainer, path: &Path) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    if !ledger.undo()? {
        output::info("Nothing to undo");
        return Ok(());
    }
    container.save_ledger(&ledger, path)?;
    output::success(&format!(
        "Undone, {} node(s), {} step(s) left",
        ledger.tree().len(),
        ledger.history().len()
    ));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_clear(container: &ServiceContainer, path: &Path, yes: bool) -> CliResult<()> {
    let mut ledger = container.ledger(path)?;
    let count = ledger.tree().len();
    if !yes {
        let question = format!("Remove all {count} node(s) from {}?", path.display());
        let confirmed = container
            .prompter
            .confirm(&question)
            .map_err(|e| InfraError::io("read confirmation", e))?;
        if !confirmed {
            output::info("Aborted");
            return Ok(());
        }
    }
    ledger.clear()?;
    container.save_ledger(&ledger, path)?;
    output::action("Cleared", &format!("{count} node(s)"));
    Ok(())
}

// ============================================================
// Queries
// ============================================================

fn cmd_report(container: &ServiceContainer, path: &Path) -> CliResult<()> {
    let ledger = container.ledger(path)?;
    let settings = &container.settings;
    let claimants = ledger.report()?;
    let lines = output::claimant_lines(
        ledger.tree(),
        &claimants,
        settings.precision,
        settings.show_zero_claimants,
    )?;

    if lines.is_empty() {
        output::info("No claimants");
    } else {
        output::header("Claimants");
        for line in &lines {
            output::detail(line);
        }
    }
    let total = ledger.total_shares()?;
    output::info(&format!("Total: {}", output::total_text(&total, settings.precision)));

    for over in ledger.over_allocations()? {
        output::warning(&output::over_allocation_line(ledger.tree(), &over)?);
    }
    Ok(())
}

fn cmd_total(container: &ServiceContainer, path: &Path) -> CliResult<()> {
    let ledger = container.ledger(path)?;
    let total = ledger.total_shares()?;
    output::info(&output::total_text(&total, container.settings.precision));
    Ok(())
}

fn cmd_tree(container: &ServiceContainer, path: &Path) -> CliResult<()> {
    let ledger = container.ledger(path)?;
    if ledger.tree().is_empty() {
        output::info("Empty ledger");
        return Ok(());
    }
    for tree in output::forest(ledger.tree(), container.settings.precision)? {
        print!("{tree}");
    }
    Ok(())
}

fn cmd_remainder(container: &ServiceContainer, path: &Path, node: &str) -> CliResult<()> {
    let ledger = container.ledger(path)?;
    let id = ledger.locate(node)?;
    let remainder = ledger.remainder_of(id)?;
    output::info(&output::share_text(&remainder, container.settings.precision));
    if remainder.is_negative() {
        output::warning(&format!("{node} is over-allocated"));
    }
    Ok(())
}

// ============================================================
// Config / completion
// ============================================================

fn cmd_config_show(container: &ServiceContainer) -> CliResult<()> {
    output::info(&container.settings.to_toml()?);
    Ok(())
}

fn cmd_config_path(container: &ServiceContainer, ledger: &Path) -> CliResult<()> {
    match global_config_path() {
        Some(p) => {
            let marker = if container.fs.exists(&p) { "" } else { " (not present)" };
            output::info(&format!("config: {}{}", p.display(), marker));
        }
        None => output::info("config: (no config directory on this platform)"),
    }
    output::info(&format!("ledger: {}", ledger.display()));
    Ok(())
}

fn cmd_config_init(container: &ServiceContainer, force: bool) -> CliResult<()> {
    let path: PathBuf = global_config_path()
        .ok_or_else(|| CliError::Usage("no config directory on this platform".into()))?;
    if container.fs.exists(&path) && !force {
        return Err(CliError::Usage(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    container
        .fs
        .write_atomic(&path, &config_template())
        .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
    output::action("Created", &path.display());
    Ok(())
}

fn cmd_completion(shell: Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

// ============================================================
// Helpers
// ============================================================

fn announce(ledger: &LedgerService, label: &str, id: NodeId) -> CliResult<()> {
    let tree = ledger.tree();
    let node = tree.node(id)?;
    output::action(
        label,
        &format!(
            "{} {} holding {}",
            tree.outline_of(id)?,
            node.name(),
            node.share()
        ),
    );
    Ok(())
}

fn print_warnings(warnings: &[ShareWarning]) {
    for warning in warnings {
        output::warning(warning);
    }
}
