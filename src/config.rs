//! Server configuration from the environment

use crate::llm::LlmConfig;
use crate::narration::TtsConfig;
use crate::state_machine::state::{DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TURNS, DEFAULT_TURN_DELAY};
use crate::state_machine::EngineSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Base for links handed out when sharing
    pub public_url: String,
    /// How long a session may go without an SSE subscriber before teardown
    pub session_idle_timeout: Duration,
    pub engine: EngineSettings,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|name| std::env::var(name).ok());
        config.llm = LlmConfig::from_env();
        config.tts = TtsConfig::from_env();
        config
    }

    /// Server and engine settings from an arbitrary variable source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = parse_or(var("DUOLOGUE_PORT"), "DUOLOGUE_PORT", DEFAULT_PORT);
        let db_path = var("DUOLOGUE_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".duologue").join("duologue.db")
            },
            PathBuf::from,
        );
        let public_url = var("DUOLOGUE_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let session_idle_timeout = Duration::from_secs(parse_positive(
            var("DUOLOGUE_SESSION_IDLE_SECS"),
            "DUOLOGUE_SESSION_IDLE_SECS",
            DEFAULT_SESSION_IDLE_SECS,
        ));

        let default_delay_ms = u64::try_from(DEFAULT_TURN_DELAY.as_millis()).unwrap_or(3000);
        let engine = EngineSettings {
            turn_delay: Duration::from_millis(parse_or(
                var("DUOLOGUE_TURN_DELAY_MS"),
                "DUOLOGUE_TURN_DELAY_MS",
                default_delay_ms,
            )),
            max_turns: parse_positive(
                var("DUOLOGUE_MAX_TURNS"),
                "DUOLOGUE_MAX_TURNS",
                DEFAULT_MAX_TURNS,
            ),
            max_messages: parse_positive(
                var("DUOLOGUE_MAX_MESSAGES"),
                "DUOLOGUE_MAX_MESSAGES",
                DEFAULT_MAX_MESSAGES,
            ),
        };

        Self {
            port,
            db_path,
            public_url,
            session_idle_timeout,
            engine,
            llm: LlmConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> T {
    let Some(raw) = value else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(var = name, value = %raw, "Invalid value; using default");
        default
    })
}

fn parse_positive<T: FromStr + PartialOrd + Default + Copy>(
    value: Option<String>,
    name: &str,
    default: T,
) -> T {
    let parsed = parse_or(value, name, default);
    if parsed > T::default() {
        parsed
    } else {
        tracing::warn!(var = name, "Value must be positive; using default");
        default
    }
}
