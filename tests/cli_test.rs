//! End-to-end tests of command dispatch against a ledger file in a temp dir.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tempfile::TempDir;

use headright::cli::{execute_command, Cli, CliResult};
use headright::config::Settings;
use headright::domain::Rational;
use headright::exitcode;
use headright::infrastructure::di::ServiceContainer;
use headright::infrastructure::traits::{FixedPrompter, RealFileSystem};
use headright::util::testing;

struct Harness {
    _temp: TempDir,
    ledger: PathBuf,
    container: ServiceContainer,
}

impl Harness {
    fn new(confirm: bool) -> Self {
        testing::init_test_setup();
        let temp = TempDir::new().unwrap();
        let ledger = temp.path().join("ledger.json");
        let settings = Settings {
            ledger_file: ledger.clone(),
            ..Settings::default()
        };
        let container = ServiceContainer::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(FixedPrompter(confirm)),
        );
        Self {
            _temp: temp,
            ledger,
            container,
        }
    }

    fn run(&self, args: &[&str]) -> CliResult<()> {
        let argv = std::iter::once("headright").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).unwrap();
        execute_command(&cli, &self.container)
    }

    fn share_at(&self, address: &str) -> Rational {
        share_in(&self.container, &self.ledger, address)
    }
}

fn share_in(container: &ServiceContainer, ledger: &Path, address: &str) -> Rational {
    let session = container.ledger(ledger).unwrap();
    let id = session.locate(address).unwrap();
    session.tree().node(id).unwrap().share().clone()
}

#[test]
fn given_owner_without_share_when_added_then_suggested_share_used() {
    let h = Harness::new(true);

    h.run(&["owner", "add", "Ann"]).unwrap();
    h.run(&["owner", "add", "Bob"]).unwrap();

    assert_eq!(h.share_at("1"), Rational::parse("1").unwrap());
    assert_eq!(h.share_at("2"), Rational::parse("1/2").unwrap());
}

#[test]
fn given_commands_when_run_then_ledger_file_reflects_each_step() {
    let h = Harness::new(true);

    h.run(&["owner", "add", "Ann", "1"]).unwrap();
    h.run(&["heir", "add", "1", "Bob", "1/2"]).unwrap();
    h.run(&["convey", "1", "1.1=1"]).unwrap();
    assert_eq!(h.share_at("1"), Rational::parse("1/2").unwrap());
    assert_eq!(h.share_at("1.1"), Rational::parse("1").unwrap());

    h.run(&["report"]).unwrap();
    h.run(&["total"]).unwrap();
    h.run(&["tree"]).unwrap();
    h.run(&["remainder", "1"]).unwrap();

    h.run(&["undo"]).unwrap();
    assert_eq!(h.share_at("1.1"), Rational::parse("1/2").unwrap());
}

#[test]
fn given_delete_with_rebalance_when_run_then_owners_equal() {
    let h = Harness::new(true);
    for name in ["Ann", "Bob", "Cid"] {
        h.run(&["owner", "add", name, "1/3"]).unwrap();
    }

    h.run(&["delete", "2", "--rebalance"]).unwrap();

    assert_eq!(h.share_at("1"), Rational::parse("1/2").unwrap());
    assert_eq!(h.share_at("2"), Rational::parse("1/2").unwrap());
}

#[test]
fn given_declined_prompt_when_clear_then_nothing_removed() {
    let h = Harness::new(false);
    h.run(&["owner", "add", "Ann", "1"]).unwrap();

    h.run(&["clear"]).unwrap();
    assert_eq!(h.container.ledger(&h.ledger).unwrap().tree().len(), 1);

    h.run(&["clear", "--yes"]).unwrap();
    assert!(h.container.ledger(&h.ledger).unwrap().tree().is_empty());
}

#[test]
fn given_unknown_address_when_run_then_noinput_exit_code() {
    let h = Harness::new(true);
    h.run(&["owner", "add", "Ann", "1"]).unwrap();

    let err = h.run(&["heir", "add", "4.2", "Bob", "1/2"]).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::NOINPUT);
}

#[test]
fn given_bad_fraction_when_run_then_dataerr_and_file_unchanged() {
    let h = Harness::new(true);
    h.run(&["owner", "add", "Ann", "1"]).unwrap();
    let before = std::fs::read_to_string(&h.ledger).unwrap();

    let err = h.run(&["heir", "add", "1", "Bob", "1/0"]).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::DATAERR);
    assert_eq!(std::fs::read_to_string(&h.ledger).unwrap(), before);
}

#[test]
fn given_empty_ledger_when_undo_then_no_file_written() {
    let h = Harness::new(true);

    h.run(&["undo"]).unwrap();

    assert!(!h.ledger.exists());
}

#[test]
fn given_explicit_file_flag_when_run_then_that_file_used() {
    let h = Harness::new(true);
    let other = h.ledger.with_file_name("other.json");
    let other_arg = other.to_string_lossy().to_string();

    h.run(&["--file", &other_arg, "owner", "add", "Ann", "1"]).unwrap();

    assert!(other.exists());
    assert!(!h.ledger.exists());
    assert_eq!(
        share_in(&h.container, &other, "1"),
        Rational::parse("1").unwrap()
    );
}
