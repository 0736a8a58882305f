use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn seed(dir: &Path) -> std::path::PathBuf {
    let db = dir.join("census.db");
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TABLE county_population (county TEXT, state TEXT, population INTEGER);
         INSERT INTO county_population VALUES ('Travis', 'TX', 1290188);",
    )
    .unwrap();

    let config = dir.join("queryweave.toml");
    std::fs::write(
        &config,
        format!(
            "[logging]\nlevel = \"error\"\n\n[[sources]]\nid = \"census_db\"\nrole = \"primary\"\ntype = \"engine\"\ndatabase = \"{}\"\n",
            db.display()
        ),
    )
    .unwrap();
    config
}

fn queryweave() -> Command {
    let mut cmd = Command::cargo_bin("queryweave").unwrap();
    cmd.env_remove("QUERYWEAVE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn query_reads_pattern_from_stdin() {
    let dir = TempDir::new().unwrap();
    let config = seed(dir.path());

    queryweave()
        .args(["query", "--pattern", "-", "--config"])
        .arg(&config)
        .write_stdin(
            r#"{"intent": "population_lookup", "entities": {"geography": ["Travis"]},
                "queryText": "SELECT county, state, population FROM county_population"}"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("\"census_db\""))
        .stdout(predicate::str::contains("\"confidenceLevel\": 0.95"))
        .stdout(predicate::str::contains("1290188"));
}

#[test]
fn query_failure_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let config = seed(dir.path());

    queryweave()
        .args(["query", "--pattern", "-", "--config"])
        .arg(&config)
        .write_stdin(r#"{"intent": "x", "queryText": "SELECT * FROM nowhere"}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("all sources failed"));
}

#[test]
fn missing_config_is_reported() {
    queryweave()
        .args(["health", "--config", "/definitely/not/here.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn health_reports_sources_as_json() {
    let dir = TempDir::new().unwrap();
    let config = seed(dir.path());

    queryweave()
        .args(["health", "--json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"healthy\""))
        .stdout(predicate::str::contains("census_db"));
}

#[test]
fn health_fails_for_missing_snapshot() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("queryweave.toml");
    std::fs::write(
        &config,
        "[[sources]]\nid = \"acs_snapshot\"\ntype = \"snapshot\"\npath = \"/no/such/acs.json\"\n",
    )
    .unwrap();

    queryweave()
        .args(["health", "--color", "never", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("acs_snapshot"))
        .stderr(predicate::str::contains("unhealthy sources"));
}

#[test]
fn config_path_comes_from_environment() {
    let dir = TempDir::new().unwrap();
    let config = seed(dir.path());

    queryweave()
        .arg("health")
        .arg("--json")
        .env("QUERYWEAVE_CONFIG", &config)
        .assert()
        .success();
}
