use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

/// The binary running in `dir`, so no `.env` or config file from the
/// checkout leaks in
fn bot(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ytaudio-bot").unwrap();
    cmd.current_dir(dir).env_remove("TELEGRAM_TOKEN").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    bot(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("cookies"));
}

#[test]
fn run_without_token_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    bot(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELEGRAM_TOKEN is not set"));
}

#[test]
fn config_shows_defaults_and_masks_token() {
    let dir = tempfile::tempdir().unwrap();
    bot(dir.path())
        .arg("config")
        .env("TELEGRAM_TOKEN", "123456789:AAE-very-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("Work Dir: downloads"))
        .stdout(predicate::str::contains("123456789:..."))
        .stdout(predicate::str::contains("very-secret").not());
}

#[test]
fn cookies_reports_sources_in_priority_order() {
    let dir = tempfile::tempdir().unwrap();
    let cookies = dir.path().join("cookies.txt");
    std::fs::write(
        &cookies,
        "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\ts3cr3tvalue\n.youtube.com\tTRUE\t/\tTRUE\t0\tHSID\tdef\n",
    )
    .unwrap();

    let config = dir.path().join("bot.yaml");
    std::fs::write(
        &config,
        format!(
            "credentials:\n  sources:\n    - kind: file\n      value: {}\n    - kind: file\n      value: {}\n",
            dir.path().join("missing.txt").display(),
            cookies.display()
        ),
    )
    .unwrap();

    bot(dir.path())
        .arg("cookies")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("(unavailable)"))
        .stdout(predicate::str::contains("2 cookies"))
        .stdout(predicate::str::contains("s3cr3tvalue").not());
}

#[test]
fn broken_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bot.yaml");
    std::fs::write(&config, "app: [not, a, map]\n").unwrap();

    bot(dir.path())
        .arg("config")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn dotenv_supplies_token_and_log_filter() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "TELEGRAM_TOKEN=987654321:AAE-from-dotenv\nRUST_LOG=ytaudio_bot=debug\n",
    )
    .unwrap();

    bot(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("987654321:..."))
        .stdout(predicate::str::contains("Loaded environment from"));
}

#[test]
fn cookie_export_without_browser_profiles_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();

    bot(dir.path())
        .env("HOME", home.path())
        .args(["cookies", "--export", "cookies.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cookie export failed"));

    assert!(!dir.path().join("cookies.txt").exists());
}
