use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

mod common;
use common::{setup_test_home, wt_in};

#[test]
fn init_creates_schema_without_touching_config_in_test_mode() {
    let (home, db_path) = setup_test_home();

    wt_in(&home)
        .args(["--db", &db_path, "--test", "init"])
        .assert()
        .success()
        .stdout(contains("Database initialized"));

    assert!(std::path::Path::new(&db_path).exists());
    assert!(!home.path().join("worktrack.conf").exists());

    // Second run finds nothing to apply.
    wt_in(&home)
        .args(["--db", &db_path, "--test", "init"])
        .assert()
        .success()
        .stdout(contains("Schema already up to date"));
}

#[test]
fn db_info_and_check_report_tables() {
    let (home, db_path) = setup_test_home();
    wt_in(&home)
        .args(["--db", &db_path, "--test", "init"])
        .assert()
        .success();

    wt_in(&home)
        .args(["--db", &db_path, "db", "--info", "--check"])
        .assert()
        .success()
        .stdout(
            contains("time_tracking")
                .and(contains("Recent operations"))
                .and(contains("Integrity check passed")),
        );
}

#[test]
fn db_without_flags_is_an_error() {
    let (home, db_path) = setup_test_home();
    wt_in(&home)
        .args(["--db", &db_path, "db"])
        .assert()
        .failure()
        .stderr(contains("nothing to do"));
}

#[test]
fn user_add_and_list() {
    let (home, db_path) = setup_test_home();
    wt_in(&home)
        .args(["--db", &db_path, "--test", "init"])
        .assert()
        .success();

    wt_in(&home)
        .args([
            "--db", &db_path, "user", "add", "--login", "root", "--name", "Root", "--password",
            "s3cret", "--role", "admin",
        ])
        .assert()
        .success()
        .stdout(contains("User 'root' created"));

    wt_in(&home)
        .args(["--db", &db_path, "user", "list"])
        .assert()
        .success()
        .stdout(contains("root").and(contains("admin")));

    // Login names are unique.
    wt_in(&home)
        .args([
            "--db", &db_path, "user", "add", "--login", "root", "--name", "Again", "--password",
            "s3cret",
        ])
        .assert()
        .failure();
}

#[test]
fn user_add_rejects_unknown_role() {
    let (home, db_path) = setup_test_home();
    wt_in(&home)
        .args(["--db", &db_path, "--test", "init"])
        .assert()
        .success();

    wt_in(&home)
        .args([
            "--db", &db_path, "user", "add", "--login", "x", "--name", "X", "--password", "pw12",
            "--role", "overlord",
        ])
        .assert()
        .failure()
        .stderr(contains("unknown role"));
}

#[test]
fn broken_config_file_is_reported() {
    let (home, db_path) = setup_test_home();
    std::fs::write(home.path().join("worktrack.conf"), "pool_size: [not a number").unwrap();

    wt_in(&home)
        .args(["--db", &db_path, "db", "--info"])
        .assert()
        .failure()
        .stderr(contains("YAML"));
}
