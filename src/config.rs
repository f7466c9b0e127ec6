//! Application-level configuration loading: game timings, AI opponents, seed data and the LLM
//! gateway settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_ARENA_CONFIG_PATH";
/// Environment variable overriding the gateway endpoint.
const GATEWAY_URL_ENV: &str = "LLM_GATEWAY_URL";
/// Environment variable holding the gateway API key.
const GATEWAY_KEY_ENV: &str = "LLM_API_KEY";
/// Environment variable holding the HS256 secret used to verify bearer tokens.
const JWT_SECRET_ENV: &str = "AUTH_JWT_SECRET";
/// Environment variable holding the expected `aud` claim, if any.
const JWT_AUDIENCE_ENV: &str = "AUTH_JWT_AUDIENCE";

const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    game: GameSettings,
    ai_names: Vec<String>,
    sample_questions: Vec<SampleQuestion>,
    subjects: Vec<SubjectSeed>,
    leaderboard_limit: usize,
    gateway: GatewaySettings,
    auth: AuthSettings,
}

/// Timing and scoring knobs of the matchmaking lobby and the game engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    /// Seconds counted down by the lobby before each start decision.
    pub countdown_secs: u32,
    /// Interval between two lobby countdown ticks.
    pub lobby_tick: Duration,
    /// Number of countdown cycles before AI opponents are injected.
    pub max_cycles: u32,
    /// Get-ready delay between `starting` and the hand-off to the game.
    pub start_delay: Duration,
    /// Delay between AI injection and the session start.
    pub ai_start_delay: Duration,
    /// Minimum number of AI opponents injected into a lonely lobby.
    pub ai_opponents_min: usize,
    /// Maximum number of AI opponents injected into a lonely lobby.
    pub ai_opponents_max: usize,
    /// Seconds available to answer each question.
    pub question_secs: u32,
    /// Interval between two question countdown ticks.
    pub round_tick: Duration,
    /// Pause after a reveal before the next question.
    pub reveal_delay: Duration,
    /// Interval between two simulated AI scoring rolls.
    pub ai_tick: Duration,
    /// Probability that an AI opponent scores on a given roll.
    pub ai_score_chance: f64,
    /// Point values an AI opponent may earn on a successful roll.
    pub ai_points: Vec<u32>,
    /// Number of questions generated for a session.
    pub questions_per_session: u8,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 20,
            lobby_tick: Duration::from_secs(1),
            max_cycles: 3,
            start_delay: Duration::from_secs(3),
            ai_start_delay: Duration::from_secs(2),
            ai_opponents_min: 1,
            ai_opponents_max: 2,
            question_secs: 15,
            round_tick: Duration::from_secs(1),
            reveal_delay: Duration::from_secs(2),
            ai_tick: Duration::from_secs(3),
            ai_score_chance: 0.7,
            ai_points: vec![80, 100],
            questions_per_session: 5,
        }
    }
}

/// Question served when generation fails for a live session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SampleQuestion {
    /// Question text.
    pub question: String,
    /// Four answer options.
    pub options: Vec<String>,
    /// Value of the correct option.
    pub correct_answer: String,
    /// Optional explanation.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Subject inserted at startup when missing from the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubjectSeed {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Icon glyph.
    pub icon: String,
    /// Color tag.
    pub color: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Location and model of the OpenAI-compatible chat completion gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// Full chat completions URL.
    pub url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature used for question generation.
    pub question_temperature: f32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bearer key, read from the environment only.
    pub api_key: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            question_temperature: 0.7,
            timeout: Duration::from_secs(60),
            api_key: None,
        }
    }
}

/// Bearer token verification settings, read from the environment only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    /// HS256 secret shared with the auth provider.
    pub jwt_secret: Option<String>,
    /// Expected audience claim; audience is not checked when absent.
    pub jwt_audience: Option<String>,
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        subjects = app_config.subjects.len(),
                        ai_names = app_config.ai_names.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(GATEWAY_URL_ENV) {
            self.gateway.url = url;
        }
        self.gateway.api_key = non_empty_env(GATEWAY_KEY_ENV);
        self.auth.jwt_secret = non_empty_env(JWT_SECRET_ENV);
        self.auth.jwt_audience = non_empty_env(JWT_AUDIENCE_ENV);

        if self.gateway.api_key.is_none() {
            warn!("{GATEWAY_KEY_ENV} is not set; generation endpoints will fail");
        }
        if self.auth.jwt_secret.is_none() {
            warn!("{JWT_SECRET_ENV} is not set; every authenticated request will be rejected");
        }
    }

    /// Game timing settings.
    pub fn game(&self) -> &GameSettings {
        &self.game
    }

    /// Pool of AI opponent display names.
    pub fn ai_names(&self) -> &[String] {
        &self.ai_names
    }

    /// Questions used when a session cannot obtain generated ones.
    pub fn sample_questions(&self) -> &[SampleQuestion] {
        &self.sample_questions
    }

    /// Subjects seeded at startup.
    pub fn subjects(&self) -> &[SubjectSeed] {
        &self.subjects
    }

    /// Maximum number of leaderboard rows returned.
    pub fn leaderboard_limit(&self) -> usize {
        self.leaderboard_limit
    }

    /// LLM gateway settings.
    pub fn gateway(&self) -> &GatewaySettings {
        &self.gateway
    }

    /// Bearer token settings.
    pub fn auth(&self) -> &AuthSettings {
        &self.auth
    }

    /// Replace the game settings.
    pub fn with_game(mut self, game: GameSettings) -> Self {
        self.game = game;
        self
    }

    /// Replace the authentication settings.
    pub fn with_auth(mut self, auth: AuthSettings) -> Self {
        self.auth = auth;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game: GameSettings::default(),
            ai_names: default_ai_names(),
            sample_questions: default_sample_questions(),
            subjects: default_subjects(),
            leaderboard_limit: 100,
            gateway: GatewaySettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    game: RawGame,
    ai_names: Option<Vec<String>>,
    sample_questions: Option<Vec<SampleQuestion>>,
    subjects: Option<Vec<SubjectSeed>>,
    leaderboard_limit: Option<usize>,
    gateway: RawGateway,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// Game section; every field is optional and expressed in whole units.
struct RawGame {
    countdown_secs: Option<u32>,
    max_cycles: Option<u32>,
    start_delay_secs: Option<u64>,
    ai_start_delay_secs: Option<u64>,
    ai_opponents_min: Option<usize>,
    ai_opponents_max: Option<usize>,
    question_secs: Option<u32>,
    reveal_delay_secs: Option<u64>,
    ai_tick_secs: Option<u64>,
    ai_score_chance: Option<f64>,
    ai_points: Option<Vec<u32>>,
    questions_per_session: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGateway {
    url: Option<String>,
    model: Option<String>,
    question_temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

impl From<RawGame> for GameSettings {
    fn from(raw: RawGame) -> Self {
        let defaults = GameSettings::default();
        let ai_opponents_min = raw
            .ai_opponents_min
            .unwrap_or(defaults.ai_opponents_min)
            .max(1);
        Self {
            countdown_secs: raw.countdown_secs.unwrap_or(defaults.countdown_secs).max(1),
            lobby_tick: defaults.lobby_tick,
            max_cycles: raw.max_cycles.unwrap_or(defaults.max_cycles).max(1),
            start_delay: raw
                .start_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.start_delay),
            ai_start_delay: raw
                .ai_start_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ai_start_delay),
            ai_opponents_min,
            ai_opponents_max: raw
                .ai_opponents_max
                .unwrap_or(defaults.ai_opponents_max)
                .max(ai_opponents_min),
            question_secs: raw.question_secs.unwrap_or(defaults.question_secs).max(1),
            round_tick: defaults.round_tick,
            reveal_delay: raw
                .reveal_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.reveal_delay),
            ai_tick: raw
                .ai_tick_secs
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or(defaults.ai_tick),
            ai_score_chance: raw
                .ai_score_chance
                .unwrap_or(defaults.ai_score_chance)
                .clamp(0.0, 1.0),
            ai_points: raw
                .ai_points
                .filter(|points| !points.is_empty())
                .unwrap_or(defaults.ai_points),
            questions_per_session: raw
                .questions_per_session
                .unwrap_or(defaults.questions_per_session)
                .clamp(1, 10),
        }
    }
}

impl From<RawGateway> for GatewaySettings {
    fn from(raw: RawGateway) -> Self {
        let defaults = GatewaySettings::default();
        Self {
            url: raw.url.unwrap_or(defaults.url),
            model: raw.model.unwrap_or(defaults.model),
            question_temperature: raw
                .question_temperature
                .unwrap_or(defaults.question_temperature),
            timeout: raw
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            api_key: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let sample_questions = value
            .sample_questions
            .map(|questions| {
                questions
                    .into_iter()
                    .filter(|q| q.options.len() == 4 && q.options.contains(&q.correct_answer))
                    .collect::<Vec<_>>()
            })
            .filter(|questions| !questions.is_empty())
            .unwrap_or_else(default_sample_questions);

        Self {
            game: value.game.into(),
            ai_names: value
                .ai_names
                .filter(|names| !names.is_empty())
                .unwrap_or_else(default_ai_names),
            sample_questions,
            subjects: value.subjects.unwrap_or_else(default_subjects),
            leaderboard_limit: value.leaderboard_limit.unwrap_or(100).clamp(1, 100),
            gateway: value.gateway.into(),
            auth: AuthSettings::default(),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn default_ai_names() -> Vec<String> {
    ["AlphaBot", "BrainMaster", "QuizWiz", "SmartBot", "ChallengeBot"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn sample(question: &str, options: [&str; 4], correct_answer: &str) -> SampleQuestion {
    SampleQuestion {
        question: question.to_owned(),
        options: options.into_iter().map(String::from).collect(),
        correct_answer: correct_answer.to_owned(),
        explanation: None,
    }
}

/// Arithmetic set served when a session cannot get generated questions.
fn default_sample_questions() -> Vec<SampleQuestion> {
    vec![
        sample("What is 2 + 2?", ["3", "4", "5", "6"], "4"),
        sample("What is 5 × 3?", ["10", "12", "15", "18"], "15"),
        sample("What is 10 - 7?", ["2", "3", "4", "5"], "3"),
        sample("What is 8 ÷ 2?", ["2", "3", "4", "5"], "4"),
        sample("What is 6 + 9?", ["13", "14", "15", "16"], "15"),
    ]
}

fn seed(id: u128, name: &str, icon: &str, color: &str, description: &str) -> SubjectSeed {
    SubjectSeed {
        id: Uuid::from_u128(id),
        name: name.to_owned(),
        icon: icon.to_owned(),
        color: color.to_owned(),
        description: Some(description.to_owned()),
    }
}

fn default_subjects() -> Vec<SubjectSeed> {
    vec![
        seed(
            0x6d61_7468_0000_4000_8000_0000_0000_0001,
            "Mathematics",
            "🔢",
            "cyan",
            "Numbers, equations and problem solving",
        ),
        seed(
            0x7363_6965_0000_4000_8000_0000_0000_0002,
            "Science",
            "🔬",
            "emerald",
            "Physics, chemistry and biology",
        ),
        seed(
            0x6869_7374_0000_4000_8000_0000_0000_0003,
            "History",
            "📜",
            "amber",
            "Events and people that shaped the world",
        ),
        seed(
            0x6765_6f67_0000_4000_8000_0000_0000_0004,
            "Geography",
            "🌍",
            "blue",
            "Countries, capitals and landscapes",
        ),
        seed(
            0x6c61_6e67_0000_4000_8000_0000_0000_0005,
            "Language Arts",
            "📚",
            "purple",
            "Grammar, vocabulary and literature",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_game_rules() {
        let config = AppConfig::default();
        assert_eq!(config.game().countdown_secs, 20);
        assert_eq!(config.game().max_cycles, 3);
        assert_eq!(config.game().question_secs, 15);
        assert_eq!(config.ai_names().len(), 5);
        assert_eq!(config.sample_questions().len(), 5);
        assert_eq!(config.leaderboard_limit(), 100);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "game": { "countdown_secs": 5, "ai_opponents_min": 3, "ai_opponents_max": 1 } }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.game().countdown_secs, 5);
        assert_eq!(config.game().ai_opponents_min, 3);
        assert_eq!(config.game().ai_opponents_max, 3);
        assert_eq!(config.game().question_secs, 15);
        assert_eq!(config.gateway().model, DEFAULT_MODEL);
    }

    #[test]
    fn zero_timings_are_raised_to_one_second() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "game": { "countdown_secs": 0, "question_secs": 0, "ai_tick_secs": 0 } }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.game().countdown_secs, 1);
        assert_eq!(config.game().question_secs, 1);
        assert_eq!(config.game().ai_tick, Duration::from_secs(1));
    }

    #[test]
    fn malformed_sample_questions_are_ignored() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "sample_questions": [ { "question": "?", "options": ["a"], "correct_answer": "a" } ] }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.sample_questions(), default_sample_questions().as_slice());
    }
}
