//! CLI integration tests for pg-rekey.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for various error conditions. None of them needs a
//! reachable database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the pg-rekey binary.
fn cmd() -> Command {
    Command::cargo_bin("pg-rekey").unwrap()
}

/// A valid configuration pointing at a port nothing listens on.
fn unreachable_config() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  host: 127.0.0.1").unwrap();
    writeln!(file, "  port: 1").unwrap();
    writeln!(file, "  database: app").unwrap();
    writeln!(file, "  user: postgres").unwrap();
    writeln!(file, "  password: secret").unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("change-primary-key"))
        .stdout(predicate::str::contains("health-check"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_change_primary_key_help() {
    cmd()
        .args(["change-primary-key", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--table"))
        .stdout(predicate::str::contains("--column"))
        .stdout(predicate::str::contains("--type"))
        .stdout(predicate::str::contains("--keep-old-key"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_init_help() {
    cmd()
        .args(["init", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pg-rekey"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("pg-rekey init"));
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1); // EXIT_CONFIG_ERROR
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  host: localhost").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_ssl_mode_exits_with_code_1() {
    let mut file = unreachable_config();
    writeln!(file, "  ssl_mode: sometimes").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ssl_mode"));
}

#[test]
fn test_invalid_table_name_exits_with_code_1() {
    let file = unreachable_config();

    cmd()
        .args(["--config", file.path().to_str().unwrap()])
        .args(["change-primary-key", "--table", "", "--column", "uuid", "--type", "uuid", "--yes"])
        .assert()
        .code(1);
}

// =============================================================================
// Exit Code Tests - Unsupported Type (Exit Code 3)
// =============================================================================

#[test]
fn test_unsupported_type_exits_with_code_3() {
    let file = unreachable_config();

    cmd()
        .args(["--config", file.path().to_str().unwrap()])
        .args(["change-primary-key", "--table", "orders", "--column", "uuid", "--type", "bigint", "--yes"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("bigint"));
}

// =============================================================================
// Exit Code Tests - Database Errors (Exit Code 6)
// =============================================================================

#[test]
fn test_unreachable_database_exits_with_code_6() {
    let file = unreachable_config();

    cmd()
        .args(["--config", file.path().to_str().unwrap()])
        .args(["change-primary-key", "--table", "orders", "--column", "uuid", "--type", "uuid", "--yes"])
        .assert()
        .code(6);
}

#[test]
fn test_health_check_reports_failure_as_json() {
    let file = unreachable_config();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "--output-json", "health-check"])
        .assert()
        .code(6)
        .stdout(predicate::str::contains("\"connected\": false"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: pg-rekey.yaml]"));
}

#[test]
fn test_short_config_flag() {
    // -c should work as short for --config
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_without_terminal_exits_with_code_1() {
    // Without a subcommand the action menu opens; with no terminal attached
    // the prompt fails as a config error instead of printing usage.
    cmd()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("interactive prompt failed"))
        .stderr(predicate::str::contains("Usage:").not());
}
