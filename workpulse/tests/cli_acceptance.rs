use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    export: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        let export = seed_activity_fixture(&base);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            export,
        }
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("workpulse");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }
}

fn seed_activity_fixture(base: &Path) -> PathBuf {
    let source = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../workpulse-core/tests/fixtures/week.json");
    let target = base.join("activity.json");
    fs::copy(source, &target).expect("failed to copy activity fixture");
    target
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("workpulse-analyze"));
    let export = env.export.to_string_lossy().into_owned();

    Command::new(bin_path)
        .arg("--blocks")
        .arg(&export)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute workpulse-analyze: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "workpulse-analyze {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn run_json(env: &CliTestEnv, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--format", "json"];
    full.extend_from_slice(args);
    let output = run_bin(env, &full);
    assert_success(&full, &output);
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn day_reports_totals_as_json() {
    let env = CliTestEnv::new();
    let day = run_json(&env, &["day", "--date", "2024-03-04"]);

    assert_eq!(day["date"], "2024-03-04");
    assert_eq!(day["total_time"], 120 * 60);
    assert_eq!(day["block_count"], 3);
    assert_eq!(day["is_complete"], true);
}

#[test]
fn week_normalizes_to_monday() {
    let env = CliTestEnv::new();
    let week = run_json(&env, &["week", "--date", "2024-03-07"]);

    assert_eq!(week["week_start"], "2024-03-04");
    assert_eq!(week["total_time"], 273 * 60);
    assert_eq!(week["peak_day"], "2024-03-05");
    assert_eq!(week["days"].as_array().map(Vec::len), Some(7));
}

#[test]
fn summary_and_trends_cover_a_range() {
    let env = CliTestEnv::new();
    let summary = run_json(
        &env,
        &["summary", "--period", "weekly", "--start", "2024-03-04", "--end", "2024-03-10"],
    );
    assert_eq!(summary["period"], "weekly");
    assert_eq!(summary["total_work_blocks"], 6);
    assert_eq!(summary["partial"], false);
    assert_eq!(summary["efficiency"]["peak_efficiency"], "09:00-10:00");

    let trend = run_json(&env, &["trends", "--start", "2024-03-04", "--end", "2024-03-05"]);
    assert_eq!(trend["direction"], "up");
}

#[test]
fn deep_work_text_output_lists_blocks() {
    let env = CliTestEnv::new();
    let args = ["deep-work", "--start", "2024-03-04", "--end", "2024-03-04"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Deep work"));
    assert!(stdout.contains("api-server"));
    assert!(stdout.contains("Flow runs:   1"), "unexpected output:\n{stdout}");
}

#[test]
fn config_offset_shifts_days() {
    let env = CliTestEnv::new();
    env.write_config("[analysis]\nutc_offset_minutes = 300\n");

    let day = run_json(&env, &["day", "--date", "2024-03-07"]);
    assert_eq!(day["block_count"], 1);
}

#[test]
fn invalid_config_fails_cleanly() {
    let env = CliTestEnv::new();
    env.write_config("[cache]\nmax_entries = 0\n");

    let args = ["day", "--date", "2024-03-04"];
    let output = run_bin(&env, &args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration"), "stderr:\n{stderr}");
}

#[test]
fn inverted_range_is_an_error() {
    let env = CliTestEnv::new();
    let args = ["pattern", "--start", "2024-03-10", "--end", "2024-03-04"];
    let output = run_bin(&env, &args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid range"), "stderr:\n{stderr}");
}

#[test]
fn aggregate_runs_a_final_pass() {
    let env = CliTestEnv::new();
    let stats = run_json(&env, &["aggregate"]);
    assert!(stats["passes"].as_u64().unwrap_or(0) >= 1);
    assert_eq!(stats["day_failures"], 0);
}
