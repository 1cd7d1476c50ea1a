use std::sync::Mutex;
use tempfile::TempDir;
use woodvision::config::{global_config_path, ConfigLoader, StudioConfig};
use woodvision::logging::{init_logging, LoggingConfig};
use woodvision::{ApiError, Studio};

/// Serializes tests that touch process environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        let saved = vars
            .iter()
            .map(|(key, value)| {
                let previous = std::env::var(key).ok();
                std::env::set_var(key, value);
                (*key, previous)
            })
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..) {
            match previous {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[test]
fn written_default_loads_back() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("studio.toml");
    ConfigLoader::write_default(&path).unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let defaults = StudioConfig::default();
    assert_eq!(config.pipeline.soul_percent, defaults.pipeline.soul_percent);
    assert_eq!(config.generation.image_model, defaults.generation.image_model);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn environment_supplies_gateway_endpoint() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let workspace = TempDir::new().unwrap();
    let _env = EnvGuard::set(&[(
        "WOODVISION__GATEWAY__ENDPOINT",
        "https://script.example.com/macros/exec",
    )]);

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(
        config.gateway.endpoint.as_deref(),
        Some("https://script.example.com/macros/exec")
    );
    assert!(Studio::from_config(config).is_ok());
}

#[test]
fn studio_requires_a_valid_gateway_configuration() {
    let config = StudioConfig::default();
    assert!(matches!(
        Studio::from_config(config),
        Err(ApiError::ConfigError(_))
    ));

    let mut config = StudioConfig::default();
    config.gateway.endpoint = Some("https://script.example.com/exec".to_string());
    config.pipeline.soul_percent = 0;
    match Studio::from_config(config) {
        Err(ApiError::ConfigError(message)) => assert!(message.contains("soul_percent")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("invalid soul percent accepted"),
    }
}

#[cfg(target_os = "linux")]
#[test]
fn global_file_sits_under_xdg_config_home() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let xdg_path = xdg.path().to_string_lossy().to_string();
    let _env = EnvGuard::set(&[("XDG_CONFIG_HOME", xdg_path.as_str())]);

    let global = global_config_path().unwrap();
    assert!(global.starts_with(xdg.path()));
    std::fs::create_dir_all(global.parent().unwrap()).unwrap();
    std::fs::write(&global, "[pipeline]\nfallback_title = \"Rustic Wood Piece\"\n").unwrap();

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.pipeline.fallback_title, "Rustic Wood Piece");

    // workspace files take precedence over the global file
    let config_dir = workspace.path().join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[pipeline]\nfallback_title = \"Workshop Special\"\n",
    )
    .unwrap();
    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.pipeline.fallback_title, "Workshop Special");
}

#[test]
fn disabled_logging_never_installs_a_subscriber() {
    let config = LoggingConfig {
        enabled: false,
        ..Default::default()
    };
    assert!(init_logging(Some(&config)).is_ok());
    assert!(init_logging(Some(&config)).is_ok());
}
