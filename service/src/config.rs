use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::{warn, LevelFilter};
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tower_cookies::Key;

/// Minimum length of a cookie signing secret, in bytes.
const MIN_COOKIE_SECRET_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to open the count stream with credentials.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Seconds between keep-alive frames sent on every open count stream
    #[arg(long, env, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub keep_alive_interval_secs: u64,

    /// Name of the cookie that carries the visitor identity
    #[arg(long, env, default_value = "visitor_id")]
    pub visitor_cookie_name: String,

    /// Days of inactivity after which a visitor identity expires
    #[arg(long, env, default_value_t = 365, value_parser = clap::value_parser!(i64).range(1..))]
    pub visitor_expiry_days: i64,

    /// Secret of at least 64 bytes used to sign the visitor cookie. When unset a random
    /// key is generated at startup and visitor identities do not survive a restart.
    #[arg(long, env, hide_env_values = true, value_parser = parse_cookie_secret)]
    pub visitor_cookie_secret: Option<String>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

fn parse_cookie_secret(secret: &str) -> Result<String, String> {
    if secret.len() < MIN_COOKIE_SECRET_LEN {
        return Err(format!(
            "cookie secret must be at least {MIN_COOKIE_SECRET_LEN} bytes, got {}",
            secret.len()
        ));
    }
    Ok(secret.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Parse from an explicit argument list (the first item is the program
    /// name), still honoring environment variables.
    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Config::try_parse_from(args)
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }

    /// Key signing the visitor cookie.
    pub fn cookie_key(&self) -> Key {
        match self
            .visitor_cookie_secret
            .as_deref()
            .map(|secret| Key::try_from(secret.as_bytes()))
        {
            Some(Ok(key)) => key,
            Some(Err(e)) => {
                warn!("Unusable visitor cookie secret ({e}), generating a random key");
                Key::generate()
            }
            None => {
                warn!("No visitor cookie secret configured, visitor identities will not survive a restart");
                Key::generate()
            }
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
