// Integration tests for configuration loading
// Parses complete blackbox.yaml files the way the binary does

use blackbox::artifact::EncryptionMethod;
use blackbox::config::{write_sample_config, Config, ConfigError, SAMPLE_CONFIG};
use blackbox::workflow::Registry;
use pretty_assertions::assert_eq;

const FULL_CONFIG: &str = r#"
databases:
  postgres:
    main_postgres:
      username: "{{ PG_USER }}"
      password: "{{ PG_PASSWORD }}"
      host: db.internal
      storage_providers: offsite
      notifiers: discord
  mariadb:
    shop:
      username: shop
      password: secret
      host: maria.internal
  redis:
    cache:
      password: secret
      host: redis.internal
      port: 6380

storage:
  dropbox:
    offsite:
      access_token: "{{ DROPBOX_TOKEN }}"
      upload_directory: /backups/
      rotation_strategies:
        - "0 * * * * 24"
        - "* * * * 0 4"
      encryption:
        method: none
  memory:
    scratch: {}

notifiers:
  discord:
    ops:
      webhook: https://discord.example/webhook
  slack:
    team:
      webhook: https://hooks.slack.example/T000
      use_block_kit: true

retention_days: 7
cooldown: 1 day
filename_format: "backup_{database_id}_{date}"
date_format: "%Y-%m-%d"
encryption:
  method: password
  password: CorrectHorse42Battery
"#;

fn env(name: &str) -> Option<String> {
    match name {
        "PG_USER" => Some("postgres".to_string()),
        "PG_PASSWORD" => Some("hunter2".to_string()),
        "DROPBOX_TOKEN" => Some("sl.token".to_string()),
        _ => None,
    }
}

#[test]
fn test_full_config_parses() {
    let config = Config::from_yaml_with(FULL_CONFIG, env).expect("config should parse");

    let postgres = &config.databases.postgres["main_postgres"];
    assert_eq!(postgres.settings.username, "postgres");
    assert_eq!(postgres.settings.password, "hunter2");
    assert_eq!(postgres.settings.port, 5432);
    assert_eq!(postgres.storage_providers.as_deref(), Some("offsite"));
    assert_eq!(postgres.notifiers.as_deref(), Some("discord"));

    assert_eq!(config.databases.mariadb["shop"].settings.port, 3306);
    assert_eq!(config.databases.redis["cache"].settings.port, 6380);
    assert_eq!(config.databases.len(), 3);

    let offsite = &config.storage.dropbox["offsite"];
    assert_eq!(offsite.settings.access_token, "sl.token");
    assert_eq!(offsite.rotation_strategies, vec!["0 * * * * 24", "* * * * 0 4"]);
    assert_eq!(offsite.encryption.as_ref().map(|e| e.method), Some(EncryptionMethod::None));
    assert!(config.storage.memory.contains_key("scratch"));

    assert!(config.notifiers.slack["team"].use_block_kit);
    assert_eq!(config.retention_days, Some(7));
    assert_eq!(config.filename_format, "backup_{database_id}_{date}");
    assert_eq!(config.encryption.method, EncryptionMethod::Password);
    assert_eq!(config.cooldown().unwrap().map(|c| c.days), Some(1));
}

#[test]
fn test_missing_environment_variable() {
    let result = Config::from_yaml_with(FULL_CONFIG, |name| {
        (name != "DROPBOX_TOKEN").then(|| "value".to_string())
    });
    assert!(matches!(result, Err(ConfigError::MissingEnv(name)) if name == "DROPBOX_TOKEN"));
}

#[test]
fn test_unterminated_placeholder() {
    let yaml = "databases:\n  mongodb:\n    main:\n      connection_string: mongodb://{{ MONGO_USER} :pw@host\n";
    assert!(matches!(
        Config::from_yaml_with(yaml, |_| Some("user".to_string())),
        Err(ConfigError::Template(_))
    ));
}

#[test]
fn test_invalid_settings_are_rejected() {
    let missing_field = "databases:\n  postgres:\n    main:\n      username: postgres\n";
    assert!(matches!(Config::from_yaml_with(missing_field, env), Err(ConfigError::Yaml(_))));

    let bad_date = "date_format: \"%Q\"\n";
    assert!(matches!(Config::from_yaml_with(bad_date, env), Err(ConfigError::Invalid(_))));

    let no_id = "filename_format: backup_{date}\n";
    assert!(matches!(Config::from_yaml_with(no_id, env), Err(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn test_registry_routes_by_id_and_kind() {
    let config = Config::from_yaml_with(FULL_CONFIG, env).unwrap();
    let registry = Registry::from_config(&config).await.expect("registry should build");

    // Notifiers are registered in kind order: discord, slack
    let notifier_ids: Vec<&str> = registry.notifiers().iter().map(|n| n.id()).collect();
    assert_eq!(notifier_ids, vec!["ops", "team"]);

    let workflows = registry.workflows().unwrap();
    let postgres = workflows
        .iter()
        .find(|w| w.database.id() == "main_postgres")
        .unwrap();
    let storage_ids: Vec<&str> = postgres
        .storage
        .iter()
        .map(|&i| registry.storage()[i].id.as_str())
        .collect();
    assert_eq!(storage_ids, vec!["offsite"]);
    assert_eq!(postgres.notifiers, vec![0]);

    let cache = workflows.iter().find(|w| w.database.id() == "cache").unwrap();
    assert_eq!(cache.storage.len(), 2);
    assert_eq!(cache.notifiers, vec![0, 1]);
}

#[tokio::test]
async fn test_storage_encryption_overrides_global() {
    let config = Config::from_yaml_with(FULL_CONFIG, env).unwrap();
    let registry = Registry::from_config(&config).await.unwrap();

    let offsite = registry.storage().iter().find(|s| s.id == "offsite").unwrap();
    let scratch = registry.storage().iter().find(|s| s.id == "scratch").unwrap();
    assert!(!offsite.encryptor.is_enabled());
    assert!(scratch.encryptor.is_enabled());
    assert!(scratch.policy.is_legacy());
    assert_eq!(offsite.policy.schedules().len(), 2);
}

#[tokio::test]
async fn test_bad_rotation_strategy_fails_at_startup() {
    let yaml = "storage:\n  memory:\n    scratch:\n      rotation_strategies: [\"* * * *\"]\n";
    let config = Config::from_yaml_with(yaml, env).unwrap();
    assert!(matches!(
        Registry::from_config(&config).await,
        Err(ConfigError::Rotation(_))
    ));
}

#[tokio::test]
async fn test_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blackbox.yaml");

    assert!(matches!(Config::load(&path).await, Err(ConfigError::NotFound(_))));

    assert!(write_sample_config(&path).await.unwrap());
    assert!(!write_sample_config(&path).await.unwrap());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE_CONFIG);

    let config = Config::load(&path).await.expect("sample should load");
    assert_eq!(config.databases.len(), 3);
}
