use nbstore_core::{CounterName, CounterStore, Polarity};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("nbstore/counts.db")
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("nbstore");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("nbstore")));
        command
            .args(args)
            .env_remove("RUST_LOG")
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", &self.xdg_data)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state);
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to execute nbstore: {e}"))
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn nbstore");
        child
            .stdin
            .take()
            .expect("missing stdin")
            .write_all(input.as_bytes())
            .expect("failed to write stdin");
        child.wait_with_output().expect("failed to wait for nbstore")
    }
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
        "nbstore {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn stdout_of(env: &CliTestEnv, args: &[&str]) -> String {
    let output = env.run(args);
    assert_success(args, &output);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn init_creates_store_with_descriptions() {
    let env = CliTestEnv::new();

    let args = ["init", "--positive-description", "spam"];
    let stdout = stdout_of(&env, &args);
    assert!(stdout.contains("positive_counter"), "got:\n{stdout}");
    assert!(stdout.contains("spam"));

    let db_path = env.db_path();
    assert!(db_path.exists(), "database should exist at {}", db_path.display());

    let store = CounterStore::open(&db_path).expect("failed to open store");
    let counter = store.counter(CounterName::Positive).expect("missing counter");
    assert_eq!(counter.value, 0);
    assert_eq!(counter.description, "spam");

    // Re-running init never overwrites
    stdout_of(&env, &["init", "--positive-description", "other"]);
    let counter = store.counter(CounterName::Positive).expect("missing counter");
    assert_eq!(counter.description, "spam");
}

#[test]
fn train_untrain_and_query() {
    let env = CliTestEnv::new();

    let stdout = stdout_of(&env, &["train", "positive", "buy", "now", "buy"]);
    assert!(stdout.contains("3 token(s) applied"), "got:\n{stdout}");

    assert_eq!(stdout_of(&env, &["count", "positive", "buy"]), "2");
    assert_eq!(stdout_of(&env, &["count", "positive", "unseen"]), "0.5");
    assert_eq!(stdout_of(&env, &["count", "negative", "unseen"]), "1");
    assert_eq!(stdout_of(&env, &["total", "positive"]), "1");

    stdout_of(&env, &["untrain", "positive", "now"]);

    let store = CounterStore::open(&env.db_path()).expect("failed to open store");
    assert_eq!(store.raw_token_count("now", Polarity::Positive).unwrap(), None);
    assert_eq!(store.raw_token_count("buy", Polarity::Positive).unwrap(), Some(2));
    assert_eq!(store.counter(CounterName::Global).unwrap().value, 0);

    // Stored zero is reported as one
    assert_eq!(stdout_of(&env, &["total", "positive"]), "1");
}

#[test]
fn train_reads_tokens_from_stdin() {
    let env = CliTestEnv::new();

    let args = ["train", "negative", "-"];
    let output = env.run_with_stdin(&args, "meeting\n\n  agenda \nmeeting\n");
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 token(s) applied"), "got:\n{stdout}");

    assert_eq!(stdout_of(&env, &["count", "negative", "meeting"]), "2");
    assert_eq!(stdout_of(&env, &["total", "negative"]), "1");

    // Lines are stored verbatim, whitespace included
    let store = CounterStore::open(&env.db_path()).expect("failed to open store");
    assert_eq!(
        store.raw_token_count("  agenda ", Polarity::Negative).unwrap(),
        Some(1)
    );
    assert_eq!(store.raw_token_count("agenda", Polarity::Negative).unwrap(), None);
    assert_eq!(store.vocabulary_size(Polarity::Negative).unwrap(), 2);
}

#[test]
fn stats_json_output() {
    let env = CliTestEnv::new();
    stdout_of(&env, &["train", "positive", "free", "free", "offer"]);
    stdout_of(&env, &["train", "negative", "lunch"]);

    let stdout = stdout_of(&env, &["stats", "--format", "json", "--top", "1"]);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("stats should be JSON");

    assert_eq!(json["global_counter"], 2);
    assert_eq!(json["positive_counter"], 1);
    assert_eq!(json["negative_counter"], 1);
    assert_eq!(json["positive_tokens"], 2);
    assert_eq!(json["top_positive"][0]["token"], "free");
    assert_eq!(json["top_positive"][0]["count"], 2);
    assert_eq!(json["top_negative"][0]["token"], "lunch");
}

#[test]
fn stats_rejects_unknown_format() {
    let env = CliTestEnv::new();

    let output = env.run(&["stats", "--format", "jsno"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("jsno"), "got:\n{stderr}");
    assert!(!env.db_path().exists());

    assert!(stdout_of(&env, &["stats", "--format", "text"]).contains("global_counter"));
}

#[test]
fn reset_overwrites_counters() {
    let env = CliTestEnv::new();
    stdout_of(&env, &["train", "positive", "buy"]);
    stdout_of(&env, &["train", "positive", "now"]);

    let store = CounterStore::open(&env.db_path()).expect("failed to open store");
    assert_eq!(store.counter(CounterName::Positive).unwrap().value, 2);

    assert_eq!(stdout_of(&env, &["reset", "positive"]), "positive_counter = 0");
    assert_eq!(store.counter(CounterName::Positive).unwrap().value, 0);
    assert_eq!(stdout_of(&env, &["total", "positive"]), "1");

    // Token counts are left alone
    assert_eq!(store.raw_token_count("buy", Polarity::Positive).unwrap(), Some(1));

    stdout_of(&env, &["reset", "global_counter", "--value", "5"]);
    assert_eq!(store.counter(CounterName::Global).unwrap().value, 5);

    stdout_of(&env, &["reset", "negative", "--value", "-3"]);
    assert_eq!(store.counter(CounterName::Negative).unwrap().value, -3);

    let output = env.run(&["reset", "neutral"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown counter"), "got:\n{stderr}");
}

#[test]
fn config_overrides_path_and_defaults() {
    let env = CliTestEnv::new();
    let custom_db = env.home.join("custom/spam.db");
    env.write_config(&format!(
        "[store]\npath = {:?}\n\n[query]\nunseen_positive = 1.0\n",
        custom_db.display().to_string()
    ));

    assert_eq!(stdout_of(&env, &["count", "positive", "unseen"]), "1");
    assert!(custom_db.exists());
    assert!(!env.db_path().exists());
}

#[test]
fn db_flag_overrides_default_path() {
    let env = CliTestEnv::new();
    let explicit = env.home.join("explicit.db");
    let explicit_arg = explicit.display().to_string();

    stdout_of(&env, &["--db", &explicit_arg, "train", "negative", "x"]);
    assert!(explicit.exists());
    assert!(!env.db_path().exists());
}

#[test]
fn invalid_polarity_is_rejected() {
    let env = CliTestEnv::new();

    let output = env.run(&["train", "neutral", "buy"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown polarity"), "got:\n{stderr}");
}

#[test]
fn corrupt_store_fails_to_open() {
    let env = CliTestEnv::new();
    let db_path = env.db_path();
    fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    fs::write(&db_path, vec![0x42u8; 4096]).unwrap();

    let output = env.run(&["stats"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("storage unavailable"), "got:\n{stderr}");
}
