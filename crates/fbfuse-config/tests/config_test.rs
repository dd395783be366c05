#![allow(clippy::unwrap_used)]
// Layering and validation tests for fbfuse-config.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use figment::Jail;
use pretty_assertions::assert_eq;

use fbfuse_config::{Config, ConfigError, load_config};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults_translate_to_master_config() {
    let cfg = Config::default();
    let master = cfg.master_config().unwrap();

    assert_eq!(cfg.listen_address(), "127.0.0.1:5000");
    assert!(!master.dummy);
    assert_eq!(master.max_channels, 4096);
    assert_eq!(master.multicast_range.to_string(), "spead://239.11.1.0+255:7147");
    assert_eq!(master.target_poll_interval, Duration::from_millis(500));
    assert_eq!(master.beam_defaults.coherent_granularity, 8);
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
        [server]
        port = 7147

        [controller]
        dummy = true
        multicast_range = "spead://239.12.0.0+63:7148"

        [controller.beam_defaults]
        coherent_nbeams = 128
        "#,
    );

    // Inside a jail so no test-local FBFUSE_* variables leak in.
    Jail::expect_with(|_| {
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.server.port, 7147);
        assert_eq!(cfg.server.host, "127.0.0.1");

        let master = cfg.master_config().unwrap();
        assert!(master.dummy);
        assert_eq!(master.multicast_range.count(), 64);
        assert_eq!(master.beam_defaults.coherent_nbeams, 128);
        assert_eq!(master.beam_defaults.coherent_tscrunch, 16);
        Ok(())
    });
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let err = load_config(Some(Path::new("/nonexistent/fbfuse.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::MissingFile { .. }));
}

#[test]
fn test_environment_wins_over_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "fbfuse.toml",
            r#"
            [controller]
            dummy = false
            groups_per_worker = 2
            "#,
        )?;
        jail.set_env("FBFUSE_CONTROLLER__DUMMY", "true");
        jail.set_env("FBFUSE_SERVER__PORT", "6000");

        let cfg = load_config(Some(Path::new("fbfuse.toml"))).unwrap();
        assert!(cfg.controller.dummy);
        assert_eq!(cfg.controller.groups_per_worker, 2);
        assert_eq!(cfg.server.port, 6000);
        Ok(())
    });
}

#[test]
fn test_validation_failures() {
    let mut cfg = Config::default();
    cfg.controller.multicast_range = "spead://10.0.0.1+3:7147".into();
    let err = cfg.master_config().unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation { ref field, .. } if field == "controller.multicast_range")
    );

    let mut cfg = Config::default();
    cfg.controller.beam_defaults.coherent_granularity = 0;
    let err = cfg.master_config().unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid controller.beam_defaults.coherent_granularity: must be positive"
    );

    let mut cfg = Config::default();
    cfg.controller.target_poll_interval_ms = 0;
    assert!(cfg.master_config().is_err());
}

#[test]
fn test_effective_config_renders_as_toml() {
    let rendered = Config::default().to_toml().unwrap();
    assert!(rendered.contains("[controller.beam_defaults]"));
    assert!(rendered.contains("multicast_range = \"spead://239.11.1.0+255:7147\""));

    let reparsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(reparsed, Config::default());
}
