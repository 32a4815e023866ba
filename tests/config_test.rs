//! Configuration loading: defaults, project files and environment overrides.

mod common;

use autofix::ConfigLoader;
use common::{temp_dir, write_file};

#[test]
fn test_project_file_and_env_are_layered() {
    let dir = temp_dir();
    write_file(
        dir.path(),
        ".autofix/config.yaml",
        "executor:\n  max_attempts: 4\n  restart_command: npm run dev\nfix_limits:\n  cooldown_secs: 7\n",
    );
    write_file(
        dir.path(),
        ".autofix/local.yaml",
        "fix_limits:\n  cooldown_secs: 1\n",
    );

    temp_env::with_vars(
        [
            ("AUTOFIX_EXECUTOR__MAX_ATTEMPTS", Some("6")),
            ("AUTOFIX_LOGGING__LEVEL", None),
        ],
        || {
            let config = ConfigLoader::load_in(dir.path()).unwrap();
            assert_eq!(config.executor.max_attempts, 6);
            assert_eq!(config.executor.restart_command.as_deref(), Some("npm run dev"));
            assert_eq!(config.fix_limits.cooldown_secs, 1);
            assert_eq!(config.fix_limits.max_attempts_per_error, 3);
            assert_eq!(config.logging.level, "info");
        },
    );
}

#[test]
fn test_invalid_values_fail_validation() {
    let dir = temp_dir();
    write_file(
        dir.path(),
        ".autofix/config.yaml",
        "classifier:\n  min_confidence: 1.5\n",
    );

    let err = ConfigLoader::load_in(dir.path()).unwrap_err();
    assert!(err.to_string().contains("min_confidence"), "{err}");
}

#[test]
fn test_explicit_file_is_loaded() {
    let dir = temp_dir();
    write_file(
        dir.path(),
        "ci.yaml",
        "executor:\n  enable_ai: false\ncontext:\n  max_context_files: 3\n",
    );

    let config = ConfigLoader::load_from_file(dir.path().join("ci.yaml")).unwrap();
    assert!(!config.executor.enable_ai);
    assert_eq!(config.context.max_context_files, 3);
    assert_eq!(config.claude.base_url, "https://api.anthropic.com");
}
