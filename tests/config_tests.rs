use std::io::Write;

use tempfile::NamedTempFile;

use queryweave::error::{ConfigError, Error};
use queryweave::infrastructure::config::federation::SourceKind;
use queryweave::infrastructure::config::settings::Config;
use queryweave::port::outbound::dataset::SourceRole;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn loads_full_config_from_file() {
    let file = write_temp_config(
        r#"
[logging]
level = "debug"
format = "json"

[pool]
min_connections = 2
max_connections = 8
acquire_timeout_ms = 250

[pool.tuning]
memory_limit_mb = 256
threads = 2
setup_statements = ["CREATE TEMP VIEW v AS SELECT 1"]

[cache]
capacity = 50
ttl_secs = 120
stale_window_secs = 30
compression_threshold_bytes = 4096

[breaker]
failure_threshold = 3
reset_timeout_ms = 15000

[federation]
default_strategy = "multi_source_aggregation"
strategies = ["multi_source_aggregation"]

[[sources]]
id = "census_db"
role = "primary"
type = "engine"
database = "data/census.db"
read_only = true

[[sources]]
id = "acs_snapshot"
type = "snapshot"
path = "data/acs.json"
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.pool.max_connections, 8);
    assert_eq!(config.pool.tuning.setup_statements.len(), 1);
    assert_eq!(config.cache.ttl_secs, 120);
    assert_eq!(config.breaker.failure_threshold, 3);
    assert_eq!(config.federation.default_strategy, "multi_source_aggregation");
    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.sources[0].role, SourceRole::Primary);
    match &config.sources[0].kind {
        SourceKind::Engine(engine) => {
            assert!(engine.read_only);
            assert!(engine.pool.is_none());
        }
        other => panic!("expected engine source, got {other:?}"),
    }
}

#[test]
fn config_rejects_zero_max_connections() {
    let file = write_temp_config("[pool]\nmin_connections = 0\nmax_connections = 0\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue { field, .. })) => {
            assert!(field.starts_with("pool."), "unexpected field {field}");
        }
        Err(err) => panic!("expected invalid pool bounds, got {err}"),
        Ok(_) => panic!("expected invalid pool bounds"),
    }
}

#[test]
fn config_rejects_unknown_source_type() {
    let file = write_temp_config(
        r#"
[[sources]]
id = "x"
type = "http"
url = "https://example.com"
"#,
    );
    assert!(matches!(
        Config::load(file.path()),
        Err(Error::Config(ConfigError::Parse(_)))
    ));
}

#[test]
fn config_rejects_invalid_source_pool_override() {
    let file = write_temp_config(
        r#"
[[sources]]
id = "census_db"
type = "engine"
database = ":memory:"

[sources.pool]
min_connections = 3
max_connections = 1
"#,
    );
    assert!(Config::load(file.path()).is_err());
}
