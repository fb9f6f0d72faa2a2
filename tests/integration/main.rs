//! Integration tests for gitpack

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// A gitpack command sandboxed to a temp HOME so tests never touch the
    /// real ~/.gitpack.
    fn gitpack(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("gitpack");
        cmd.env("HOME", home.path());
        cmd.env_remove("GITPACK_CONFIG");
        cmd.env_remove("GITPACK_TOKEN");
        cmd
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Content-addressed build cache"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gitpack"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.json"));
    }

    #[test]
    fn config_show_defaults() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"registry\""))
            .stdout(predicate::str::contains("\"cache\""));
    }

    #[test]
    fn config_show_redacts_token() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .env("GITPACK_TOKEN", "super-secret-token")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("<redacted>"))
            .stdout(predicate::str::contains("super-secret-token").not());
    }

    #[test]
    fn config_set_and_show_roundtrip() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["config", "set", "cache.max_size_bytes", "123456"])
            .assert()
            .success();
        gitpack(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("123456"));
    }

    #[test]
    fn config_set_unknown_key_lists_valid_keys() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["config", "set", "nope.nope", "1"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn build_rejects_malformed_spec() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["build", "no-sha-here"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("<git-url>#<commit-sha>"));
    }

    #[test]
    fn build_rejects_partial_sha() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["build", "https://github.com/a/b#abc123"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("40-character"));
    }

    #[test]
    fn get_total_miss_reports_all_tiers_exhausted() {
        let home = TempDir::new().unwrap();
        let sha = "0123456789abcdef0123456789abcdef01234567";
        // Port 1 on loopback refuses immediately, so the git fallback fails
        // fast instead of reaching out to a real host.
        gitpack(&home)
            .args(["get", &format!("https://127.0.0.1:1/a/b#{}", sha)])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found in any cache tier"));
    }

    #[test]
    fn prune_empty_cache_is_within_limit() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["prune", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("within limit"));
    }

    #[test]
    fn clear_empty_cache() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already empty"));
    }

    #[test]
    fn status_lists_tiers() {
        let home = TempDir::new().unwrap();
        gitpack(&home)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache tiers"))
            .stdout(predicate::str::contains("local"));
    }
}
