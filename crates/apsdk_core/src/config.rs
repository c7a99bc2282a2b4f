//! Client configuration.

use crate::error::SdkError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://apis.appacitive.com/v1.0";

/// Default page size for list and find calls.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Platform environment a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Development data.
    #[default]
    Sandbox,
    /// Production data.
    Live,
}

impl Environment {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Live => "live",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Environment::Sandbox),
            "live" => Ok(Environment::Live),
            other => Err(SdkError::validation(format!("unknown environment: {other}"))),
        }
    }
}

/// Amount of diagnostic detail the server returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verbosity {
    /// Normal output.
    #[default]
    Info,
    /// Extended output.
    Verbose,
}

impl Verbosity {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Info => "info",
            Verbosity::Verbose => "verbose",
        }
    }
}

/// Configuration shared by every call made through a platform.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key sent with every request.
    pub api_key: String,
    /// Target environment.
    pub environment: Environment,
    /// API root URL, without a trailing slash.
    pub base_url: String,
    /// Page size used when a query does not set one.
    pub page_size: u32,
    /// Request timeout.
    pub timeout: Duration,
    /// Ask the server for debug output.
    pub debug: bool,
    /// Server output verbosity.
    pub verbosity: Verbosity,
    /// Session token of the logged in user.
    pub user_token: Option<String>,
}

impl ClientConfig {
    /// Creates a new configuration.
    pub fn new(api_key: impl Into<String>, environment: Environment) -> Self {
        Self {
            api_key: api_key.into(),
            environment,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(30),
            debug: false,
            verbosity: Verbosity::Info,
            user_token: None,
        }
    }

    /// Sets the API root URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the default page size. Zero is ignored.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables server debug output.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the server output verbosity.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Sets the user session token.
    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("", Environment::Sandbox)
    }
}

/// Per-call overrides layered over [`ClientConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Fields to return. Empty means all fields.
    pub fields: Vec<String>,
    /// Overrides [`ClientConfig::debug`].
    pub debug: Option<bool>,
    /// Overrides [`ClientConfig::verbosity`].
    pub verbosity: Option<Verbosity>,
    /// Overrides [`ClientConfig::user_token`].
    pub user_token: Option<String>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the returned fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets debug output for this call.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Sets verbosity for this call.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    /// Sets the user token for this call.
    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }
}
