//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::{ColoredString, Colorize};
use termtree::Tree;

use crate::domain::{
    Balance, ClaimKind, Claimant, DomainResult, NodeId, OverAllocation, Rational, ShareTree,
    TotalShares,
};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// `1/3 (33.3333%)`
pub fn share_text(share: &Rational, precision: usize) -> String {
    format!("{} ({:.*}%)", share, precision, share.to_percentage())
}

/// Total line colored by balance: exact green, under yellow, over red.
pub fn total_text(total: &TotalShares, precision: usize) -> ColoredString {
    let text = format!(
        "{} ({:.*}%) {}",
        total.total, precision, total.percentage, total.balance
    );
    match total.balance {
        Balance::Exact => text.green(),
        Balance::Under => text.yellow(),
        Balance::Over => text.red().bold(),
        Balance::Empty => text.dimmed(),
    }
}

/// One line per claimant: `<address>  <name>  <share> [retained]`.
pub fn claimant_lines(
    tree: &ShareTree,
    claimants: &[Claimant],
    precision: usize,
    show_zero: bool,
) -> DomainResult<Vec<String>> {
    let mut lines = Vec::with_capacity(claimants.len());
    for claimant in claimants {
        if claimant.share.is_zero() && !show_zero {
            continue;
        }
        let marker = match claimant.kind {
            ClaimKind::Leaf => "",
            ClaimKind::Retained => " [retained]",
        };
        lines.push(format!(
            "{:<8} {:<20} {}{}",
            tree.outline_of(claimant.node)?,
            claimant.name,
            share_text(&claimant.share, precision),
            marker
        ));
    }
    Ok(lines)
}

pub fn over_allocation_line(tree: &ShareTree, over: &OverAllocation) -> DomainResult<String> {
    Ok(format!(
        "{} {} allocated {} more than it holds",
        tree.outline_of(over.node)?,
        over.name,
        over.excess
    ))
}

/// Forest as termtree, one tree per original owner.
pub fn forest(tree: &ShareTree, precision: usize) -> DomainResult<Vec<Tree<String>>> {
    tree.roots()
        .iter()
        .map(|&root| subtree(tree, root, precision))
        .collect()
}

fn subtree(tree: &ShareTree, id: NodeId, precision: usize) -> DomainResult<Tree<String>> {
    let node = tree.node(id)?;
    let mut label = format!(
        "{} {}: {}",
        tree.outline_of(id)?,
        node.name(),
        share_text(node.share(), precision)
    );
    if !node.is_leaf() {
        let remainder = tree.unallocated(id)?;
        if !remainder.is_zero() {
            label.push_str(&format!(", unallocated {remainder}"));
        }
    }
    let leaves = node
        .children()
        .iter()
        .map(|&child| subtree(tree, child, precision))
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(Tree::new(label).with_leaves(leaves))
}
