use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

/// Signing algorithms accepted for access and refresh tokens. Only HMAC variants are
/// supported since tokens are signed with a shared process secret.
const JWT_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

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

/// Where refresh tokens are recorded. `Memory` keeps them in-process and loses them on
/// restart, `Redis` keeps them in a shared key-value store with a TTL.
#[derive(Clone, Debug, PartialEq)]
pub enum RefreshTokenBackend {
    Memory,
    Redis,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RefreshTokenBackendParseError;

impl FromStr for RefreshTokenBackend {
    type Err = RefreshTokenBackendParseError;
    fn from_str(backend: &str) -> Result<RefreshTokenBackend, Self::Err> {
        match backend.to_lowercase().as_str() {
            "memory" => Ok(RefreshTokenBackend::Memory),
            "redis" => Ok(RefreshTokenBackend::Redis),
            _ => Err(RefreshTokenBackendParseError),
        }
    }
}

impl fmt::Display for RefreshTokenBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RefreshTokenBackend::Memory => write!(f, "memory"),
            RefreshTokenBackend::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
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

    /// The secret used to sign and verify access and refresh tokens.
    #[arg(long, env, hide_env_values = true)]
    jwt_secret_key: Option<String>,

    /// The signing algorithm used for access and refresh tokens.
    #[arg(long, env, default_value = "HS256",
        value_parser = clap::builder::PossibleValuesParser::new(JWT_ALGORITHMS))]
    jwt_algorithm: String,

    /// Lifetime of an access token in minutes
    #[arg(long, env, default_value_t = 15)]
    pub access_token_expire_minutes: u64,

    /// Lifetime of a refresh token (and its stored record) in days
    #[arg(long, env, default_value_t = 7)]
    pub refresh_token_expire_days: u64,

    /// Backend that records the currently valid refresh token for each user.
    #[arg(
    long,
    env,
    default_value_t = RefreshTokenBackend::Memory,
    value_parser = clap::builder::PossibleValuesParser::new(["memory", "redis", "MEMORY", "REDIS"])
        .map(|s| s.parse::<RefreshTokenBackend>().unwrap()),
    )]
    pub refresh_token_backend: RefreshTokenBackend,

    /// Connection URL for the Redis refresh token backend
    #[arg(long, env, default_value = "redis://localhost:6379")]
    redis_url: String,

    /// Number of notifications buffered per SSE connection before new ones are dropped
    #[arg(long, env, default_value_t = 64)]
    pub sse_channel_capacity: usize,

    /// How often an idle SSE stream wakes up to check for shutdown, in milliseconds
    #[arg(long, env, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub sse_poll_interval_millis: u64,
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

    /// Builds a `Config` from an explicit argument list instead of the process arguments.
    /// The first item is the binary name. Environment variables still apply.
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Config::try_parse_from(args)
    }

    pub fn set_jwt_secret_key(mut self, jwt_secret_key: String) -> Self {
        self.jwt_secret_key = Some(jwt_secret_key);
        self
    }

    /// Drops any signing secret picked up from the environment or a `.env` file.
    pub fn clear_jwt_secret_key(mut self) -> Self {
        self.jwt_secret_key = None;
        self
    }

    pub fn jwt_secret_key(&self) -> Option<&str> {
        self.jwt_secret_key.as_deref()
    }

    pub fn jwt_algorithm(&self) -> &str {
        &self.jwt_algorithm
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    /// Lifetime of a refresh token in seconds. Also used as the refresh cookie max-age
    /// and the TTL of the stored refresh record.
    pub fn refresh_token_ttl_secs(&self) -> u64 {
        self.refresh_token_expire_days * 24 * 60 * 60
    }

    pub fn access_token_ttl_secs(&self) -> u64 {
        self.access_token_expire_minutes * 60
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }

    pub fn is_development(&self) -> bool {
        self.runtime_env() == RustEnv::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_applied() {
        let config = Config::from_args(["calendar_platform"]).unwrap();

        assert_eq!(config.jwt_algorithm(), "HS256");
        assert_eq!(config.access_token_expire_minutes, 15);
        assert_eq!(config.refresh_token_expire_days, 7);
        assert_eq!(config.refresh_token_backend, RefreshTokenBackend::Memory);
        assert_eq!(config.sse_channel_capacity, 64);
        assert!(config.is_development());
    }

    #[test]
    fn test_refresh_token_ttl_is_expressed_in_seconds() {
        let config = Config::from_args(["calendar_platform", "--refresh-token-expire-days", "2"])
            .unwrap();

        assert_eq!(config.refresh_token_ttl_secs(), 2 * 86_400);
    }

    #[test]
    fn test_unsupported_algorithm_is_rejected() {
        let result = Config::from_args(["calendar_platform", "--jwt-algorithm", "RS256"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_backend_parses_case_insensitively() {
        assert_eq!(
            "REDIS".parse::<RefreshTokenBackend>(),
            Ok(RefreshTokenBackend::Redis)
        );
        assert_eq!(
            "postgres".parse::<RefreshTokenBackend>(),
            Err(RefreshTokenBackendParseError)
        );
    }

    #[test]
    fn test_set_jwt_secret_key() {
        let config = Config::from_args(["calendar_platform"])
            .unwrap()
            .set_jwt_secret_key("secret".to_string());

        assert_eq!(config.jwt_secret_key(), Some("secret"));
        assert_eq!(config.clear_jwt_secret_key().jwt_secret_key(), None);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let result = Config::from_args(["calendar_platform", "--sse-poll-interval-millis", "0"]);

        assert!(result.is_err());
    }
}
