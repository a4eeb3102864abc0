// Regression tests for the self-test executable: exit status, listing and
// miette-rendered errors.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn selftest() -> Command {
    Command::cargo_bin("sectional-selftest").unwrap()
}

#[test]
fn default_run_passes() {
    selftest()
        .assert()
        .success()
        .stdout(contains("All tests passed"));
}

#[test]
fn hidden_failing_test_sets_the_exit_status() {
    selftest()
        .arg("[.failing]")
        .assert()
        .code(1)
        .stdout(contains("FAILED:").and(contains("CHECK_EQ( 6 * 7 == 41 )")));
}

#[test]
fn list_shows_visible_tests_only() {
    selftest()
        .arg("--list")
        .assert()
        .success()
        .stdout(
            contains("vectors can be sized and resized")
                .and(contains("[vector]"))
                .and(contains("deliberately failing").not()),
        );
}

#[test]
fn unknown_reporter_is_a_diagnostic() {
    selftest()
        .args(["--reporter", "xml"])
        .assert()
        .failure()
        .stderr(contains("sectional::reporter::unknown").or(contains("help:")));
}

#[test]
fn malformed_filter_is_a_diagnostic() {
    selftest()
        .arg("[unterminated")
        .assert()
        .failure()
        .stderr(contains("sectional::filter"));
}
