use std::sync::Arc;

mod client;
pub mod code;
mod response;
pub mod runner;
pub mod scenario;
pub mod summary;

pub use client::{Client, HttpResponse};
use response::IntoResponse;
use summary::Summary;
use toml::{map::Map, Value};
use tracing::info;

pub const HOST_ENV: &str = "MY_HOSTNAME";

const DEFAULT_VUS: usize = 2;
const DEFAULT_ITERATIONS: usize = 2;
const DEFAULT_PATH: &str = "/api/channel/upsert-with-lock";
const DEFAULT_CODE_LENGTH: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum LoadTestError {
    #[error("invalid configuration: {}", message)]
    Config { message: String },

    #[error("in reqwest crate: {}: {}", message, source)]
    Reqwest {
        message: String,
        source: reqwest::Error,
    },

    #[error("in serde_json crate: {}: {}", message, source)]
    SerdeJson {
        message: String,
        source: serde_json::Error,
    },

    #[error("in tokio task: {}: {}", message, source)]
    Join {
        message: String,
        source: tokio::task::JoinError,
    },
}

#[derive(Clone, Debug)]
pub struct State {
    client: Client,
    config: Config,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub vus: usize,
    pub iterations: usize,
    pub path: String,
    pub code_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vus: DEFAULT_VUS,
            iterations: DEFAULT_ITERATIONS,
            path: DEFAULT_PATH.to_string(),
            code_length: DEFAULT_CODE_LENGTH,
        }
    }
}

impl State {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn url(&self) -> String {
        self.client.url(&self.config.path)
    }
}

/// Loads configuration, reads the target host from `MY_HOSTNAME` and runs
/// the upsert scenario to completion.
pub async fn serve(config_name: &str) -> Result<Summary, LoadTestError> {
    info!(task = "start channel load test", config = config_name);

    let config = util::load_config(config_name).map_err(|e| {
        LoadTestError::Config {
            message: format!("{:#}", e),
        }
    })?;

    let state = init_state(std::env::var(HOST_ENV).ok(), &config)?;

    runner::run(Arc::new(state)).await
}

/// Builds the runner state. Every configuration problem surfaces here, before
/// any request is sent.
pub fn init_state(
    host: Option<String>,
    config: &Map<String, Value>,
) -> Result<State, LoadTestError> {
    let base_url = init_base_url(host)?;
    let config = init_config(config)?;

    validate_url(&format!("{}{}", base_url, config.path))?;

    let client = Client::new(&base_url)?;

    Ok(State::new(client, config))
}

fn validate_url(url: &str) -> Result<(), LoadTestError> {
    let parsed = url::Url::parse(url).map_err(|e| LoadTestError::Config {
        message: format!("invalid target url {}: {}", url, e),
    })?;

    let scheme_ok = matches!(parsed.scheme(), "http" | "https");
    if !scheme_ok || parsed.host_str().is_none() {
        return Err(LoadTestError::Config {
            message: format!(
                "target url {} must be http(s) with a host, e.g. http://localhost:8080",
                url
            ),
        });
    }

    Ok(())
}

pub fn init_base_url(host: Option<String>) -> Result<String, LoadTestError> {
    let host = host
        .into_response(&format!("{} is not set", HOST_ENV))?
        .trim()
        .trim_end_matches('/')
        .to_string();

    if host.is_empty() {
        return Err(LoadTestError::Config {
            message: format!("{} is empty", HOST_ENV),
        });
    }

    Ok(host)
}

pub fn init_config(
    config: &Map<String, Value>,
) -> Result<Config, LoadTestError> {
    let defaults = Config::default();

    let Some(scenario) = config.get("scenario") else {
        return Ok(defaults);
    };
    let scenario = scenario
        .as_table()
        .into_response("scenario config must be a table")?;

    let vus = read_count(scenario, "vus", defaults.vus)?;
    let iterations = read_count(scenario, "iterations", defaults.iterations)?;
    let code_length =
        read_count(scenario, "code_length", defaults.code_length)?;

    let path = match scenario.get("path") {
        Some(path) => path
            .as_str()
            .into_response("failed to parse path config")?
            .to_string(),
        None => defaults.path,
    };

    if vus == 0 || iterations == 0 {
        return Err(LoadTestError::Config {
            message: format!(
                "vus and iterations must be positive, got vus={} iterations={}",
                vus, iterations
            ),
        });
    }

    Ok(Config {
        vus,
        iterations,
        path,
        code_length,
    })
}

fn read_count(
    scenario: &Map<String, Value>,
    key: &str,
    default: usize,
) -> Result<usize, LoadTestError> {
    let Some(value) = scenario.get(key) else {
        return Ok(default);
    };

    let value = value
        .as_integer()
        .into_response(&format!("failed to parse {} config", key))?;

    usize::try_from(value)
        .ok()
        .into_response(&format!("{} config must not be negative", key))
}
