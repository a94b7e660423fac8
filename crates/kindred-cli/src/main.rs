mod render;
mod script;

use std::env;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use kindred_core::outcome::QuotaKey;
use kindred_core::outcome::QuotaLedger;
use kindred_core::persistence::OutcomeEventStore;
use kindred_core::persistence::QuotaSnapshot;
use kindred_core::persistence::replay_history;
use kindred_core::persistence::replay_inbox;
use kindred_core::profile::UserProfile;
use kindred_core::recommend::IntentRuleTable;
use kindred_core::KindredConfig;
use kindred_core::SessionState;
use kindred_exec::sample_pool;
use kindred_exec::Notice;
use kindred_exec::SessionDriver;
use kindred_exec::SimulatedAssistant;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::script::SessionScript;

const DEFAULT_LOG_FILTER: &str = "kindred=info,kindred_core=info,kindred_exec=info";

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("kindred {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "demo" => {
            let options = Options::parse(args.collect())?;
            run_session(SessionScript::demo()?, &options)
        }
        "play" => {
            let options = Options::parse(args.collect())?;
            let Some(path) = options.script.as_deref() else {
                bail!("play requires --script PATH");
            };
            run_session(SessionScript::load(path)?, &options)
        }
        "history" => {
            let options = Options::parse(args.collect())?;
            show_history(&options)
        }
        _ => {
            print_help();
            bail!("unknown command: {command}")
        }
    }
}

#[derive(Debug, Default)]
struct Options {
    script: Option<PathBuf>,
    config: Option<PathBuf>,
    rules: Option<PathBuf>,
    store: Option<PathBuf>,
}

impl Options {
    fn parse(args: Vec<String>) -> Result<Self> {
        let mut options = Self::default();
        let mut i = 0;
        while i < args.len() {
            let slot = match args[i].as_str() {
                "--script" => &mut options.script,
                "--config" => &mut options.config,
                "--rules" => &mut options.rules,
                "--store" => &mut options.store,
                other => bail!("unsupported argument: {other}"),
            };
            let Some(value) = args.get(i + 1) else {
                bail!("{} requires a path", args[i]);
            };
            *slot = Some(PathBuf::from(value));
            i += 2;
        }
        Ok(options)
    }

    fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("kindred")
                .join("outcomes.jsonl")
        })
    }
}

/// Reads `--config`, or the user config file when present, and validates
/// the result.
fn load_config(explicit: Option<&Path>) -> Result<KindredConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => dirs::config_dir()
            .map(|dir| dir.join("kindred").join("config.toml"))
            .filter(|path| path.exists()),
    };
    let config = match path {
        Some(path) => {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("read config {}", path.display()))?;
            let config: KindredConfig = toml::from_str(&source)
                .with_context(|| format!("parse config {}", path.display()))?;
            info!(path = %path.display(), "loaded config");
            config
        }
        None => KindredConfig::default(),
    };
    config.validate().context("invalid config")?;
    Ok(config)
}

fn load_rules(path: &Path) -> Result<IntentRuleTable> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("read rules {}", path.display()))?;
    IntentRuleTable::from_yaml(&source).with_context(|| format!("parse rules {}", path.display()))
}

fn run_session(script: SessionScript, options: &Options) -> Result<()> {
    let state = play_session(script, options)?;
    println!();
    print!("{}", render::transcript(&state));
    println!();
    println!("{}", render::balances(&state));
    println!("outcomes: {}", options.store_path().display());
    Ok(())
}

/// Plays `script` against the outcome log and returns the final session.
fn play_session(script: SessionScript, options: &Options) -> Result<SessionState> {
    let config = load_config(options.config.as_deref())?;
    let store_path = options.store_path();
    let mut store = OutcomeEventStore::open(&store_path)
        .with_context(|| format!("open outcome log {}", store_path.display()))?;
    let records = store.load()?;

    let pool = match script.pool {
        Some(pool) => pool,
        None => sample_pool().context("parse built-in candidate pool")?,
    };
    let requester = script.requester.unwrap_or_else(|| UserProfile {
        name: "Guest".to_string(),
        ..UserProfile::default()
    });

    let mut state = SessionState::new(config, requester, pool.clone());
    if let Some(path) = options.rules.as_deref() {
        state = state.with_rules(load_rules(path)?);
    }
    let mut last_seq = records.last().map_or(0, |record| record.seq);
    match store.load_snapshot() {
        Ok(Some(snapshot)) => {
            last_seq = last_seq.max(snapshot.seq);
            state = state.with_ledger(snapshot.restore());
        }
        Ok(None) => {}
        Err(err) => warn!(error = %err, "ignoring unreadable quota snapshot"),
    }
    state.hydrate(&records);
    info!(
        records = records.len(),
        contacts = state.outcomes.history.records().len(),
        "hydrated outcome history"
    );

    let assistant = SimulatedAssistant::new(script.replies.unwrap_or_default(), pool.clone());
    let mut driver = SessionDriver::new(state, assistant);

    for step in &script.steps {
        script::play_step(&mut driver, &pool, step)
            .with_context(|| format!("step `{}`", step.label()))?;
        for notice in driver.drain_notices() {
            print_notice(&notice);
        }
        for event in driver.drain_persisted() {
            last_seq = store.append(event)?;
        }
    }
    driver.run_until_idle(60_000);
    for notice in driver.drain_notices() {
        print_notice(&notice);
    }
    for event in driver.drain_persisted() {
        last_seq = store.append(event)?;
    }

    let state = driver.into_state();
    store.save_snapshot(&QuotaSnapshot::capture(last_seq, &state.outcomes.ledger))?;
    Ok(state)
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Toast(text) => println!("  * {text}"),
        Notice::ComposerOpened { name, .. } => println!("  * Writing a whisper to {name}"),
        Notice::ComposerClosed { .. } => println!("  * Whisper discarded."),
        Notice::StackExhausted { .. } => println!("  * That's everyone for now."),
    }
}

fn show_history(options: &Options) -> Result<()> {
    let store_path = options.store_path();
    let store = OutcomeEventStore::open(&store_path)
        .with_context(|| format!("open outcome log {}", store_path.display()))?;
    let records = store.load()?;
    let history = replay_history(&records);
    let inbox = replay_inbox(&records);

    println!("contacts ({}):", history.records().len());
    for contact in history.records() {
        let mut line = format!(
            "  {} ({})  contacted {}",
            contact.profile.name,
            contact.profile.id,
            contact.contacted_at.format("%Y-%m-%d %H:%M")
        );
        if contact.gifted_receives > 0 {
            line.push_str(&format!("  gifted {}", contact.gifted_receives));
        }
        if contact.reported {
            line.push_str("  reported");
        }
        println!("{line}");
    }
    println!("pending friend requests ({}):", inbox.rows().len());
    for row in inbox.rows() {
        println!("  {} ({})", row.request.profile.name, row.request.profile.id);
    }
    if let Some(snapshot) = store.load_snapshot()? {
        let ledger = snapshot.restore();
        println!(
            "whispers: {}  credits: {}  (as of event {})",
            ledger.balance(&QuotaKey::Whispers),
            ledger.balance(&QuotaKey::Credits),
            snapshot.seq
        );
    }
    Ok(())
}

fn print_help() {
    println!("kindred {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  kindred demo [--config PATH] [--rules PATH] [--store PATH]");
    println!("  kindred play --script PATH [--config PATH] [--rules PATH] [--store PATH]");
    println!("  kindred history [--store PATH]");
    println!("  kindred --help");
    println!("  kindred --version");
    println!();
    println!("Logging follows RUST_LOG (default: {DEFAULT_LOG_FILTER}).");
}

#[cfg(test)]
mod tests {
    use kindred_core::persistence::OutcomeEvent;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn options_parse_paths() {
        let options = Options::parse(vec![
            "--store".to_string(),
            "/tmp/o.jsonl".to_string(),
            "--rules".to_string(),
            "rules.yaml".to_string(),
        ])
        .expect("parse");
        assert_eq!(options.store_path(), PathBuf::from("/tmp/o.jsonl"));
        assert_eq!(options.rules, Some(PathBuf::from("rules.yaml")));
        assert!(Options::parse(vec!["--store".to_string()]).is_err());
        assert!(Options::parse(vec!["--bogus".to_string(), "x".to_string()]).is_err());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[swipe]\ndistance_threshold = 120.0\n").expect("write");
        let config = load_config(Some(&path)).expect("config");
        assert_eq!(config.swipe.distance_threshold, 120.0);
        assert_eq!(config.stack, KindredConfig::default().stack);

        std::fs::write(&path, "[outcome]\ngift_cap = 0\n").expect("write");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn demo_session_persists_outcomes_and_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store_path = dir.path().join("outcomes.jsonl");
        let options = Options {
            store: Some(store_path.clone()),
            ..Options::default()
        };

        run_session(SessionScript::demo().expect("demo"), &options).expect("session");

        let store = OutcomeEventStore::open(&store_path).expect("store");
        let records = store.load().expect("records");
        assert!(records.iter().any(|record| matches!(
            &record.event,
            OutcomeEvent::Contacted { contact, .. } if contact.profile.id.as_str() == "lin-wei"
        )));
        assert!(records
            .iter()
            .any(|record| matches!(record.event, OutcomeEvent::FriendRequestResolved { .. })));
        let snapshot = store.load_snapshot().expect("read").expect("snapshot");
        assert_eq!(snapshot.seq, records.last().expect("last").seq);
        assert_eq!(snapshot.restore().balance(&QuotaKey::Credits), 17);
    }

    #[test]
    fn category_query_without_streamed_pool_uses_the_session_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = Options {
            store: Some(dir.path().join("outcomes.jsonl")),
            ..Options::default()
        };
        let script: SessionScript = serde_yaml::from_str(
            r#"
steps:
  - do: say
    text: anyone in fintech who knows finance
  - do: settle
"#,
        )
        .expect("script");

        let state = play_session(script, &options).expect("session");

        let ids: Vec<&str> = state
            .active_stack()
            .expect("anchored stack")
            .profiles()
            .iter()
            .map(|profile| profile.id.as_str())
            .collect();
        assert_eq!(ids, vec!["sofia-rossi"]);
    }
}
