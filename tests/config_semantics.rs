// 配置只在构建运行时时读取一次；运行期不支持修改。
use mmg_activator::{config::RUNTIME_DEFAULT_USE_BUILDERS, prelude::*};

#[test]
fn missing_fields_fall_back_to_defaults() {
    let cfg = RuntimeConfig::from_json_str(r#"{ "probe": true, "use_inventory": false }"#).unwrap();
    assert!(cfg.probe);
    assert!(!cfg.use_inventory);
    assert_eq!(cfg.use_builders, RUNTIME_DEFAULT_USE_BUILDERS);
    assert_eq!(cfg.module_extension, "module");
    assert!(cfg.probe_paths.is_empty());
}

#[test]
fn config_files_are_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runtime.json");
    std::fs::write(
        &path,
        r#"{ "probe_paths": ["plugins"], "module_extension": "plug", "use_builders": false }"#,
    )
    .unwrap();
    let cfg = RuntimeConfig::from_file(&path).unwrap();
    assert_eq!(cfg.probe_paths, vec![std::path::PathBuf::from("plugins")]);
    assert_eq!(cfg.module_extension, "plug");
    assert!(!cfg.use_builders);

    assert!(RuntimeConfig::from_json_str("{ not json").is_err());
    assert!(RuntimeConfig::from_file(dir.path().join("absent.json")).is_err());
}

#[test]
fn diagnostics_logging_installs_a_handler() {
    let quiet = Runtime::new(RuntimeConfig {
        use_inventory: false,
        ..RuntimeConfig::default()
    })
    .unwrap();
    assert!(quiet.exception_handler().is_none());

    let noisy = Runtime::new(RuntimeConfig {
        use_inventory: false,
        log_diagnostics: true,
        ..RuntimeConfig::default()
    })
    .unwrap();
    assert!(noisy.exception_handler().is_some());
    assert!(noisy.config().log_diagnostics);
}
