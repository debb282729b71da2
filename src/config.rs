use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Upstream endpoints.
///
/// Default to the provider's production hosts. Tests point these at a local
/// mock server.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Endpoints {
    /// Gateway RPC endpoint.
    pub gateway: Url,

    /// Base URL of the public REST API. Must end with a slash.
    pub api: Url,
}

impl Endpoints {
    const GATEWAY_URL: &'static str = "https://www.deezer.com/ajax/gw-light.php";
    const API_URL: &'static str = "https://api.deezer.com/";

    /// Creates endpoints from their URLs, normalizing the API base so that
    /// relative paths join below it.
    ///
    /// # Errors
    ///
    /// Returns an error if either URL cannot be used as a base.
    pub fn new(gateway: Url, mut api: Url) -> Result<Self> {
        if gateway.cannot_be_a_base() || api.cannot_be_a_base() {
            return Err(Error::configuration("endpoint URLs must be absolute"));
        }

        if !api.path().ends_with('/') {
            let path = format!("{}/", api.path());
            api.set_path(&path);
        }

        Ok(Self { gateway, api })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gateway: Url::parse(Self::GATEWAY_URL).expect("invalid gateway url"),
            api: Url::parse(Self::API_URL).expect("invalid api url"),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub app_lang: String,

    pub user_agent: String,

    pub endpoints: Endpoints,

    /// Deadline for each upstream request, including reading the body.
    pub timeout: Duration,

    /// Deadline for each individual network read.
    pub read_timeout: Duration,
}

impl Config {
    /// Default deadline for a whole upstream request.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default deadline for a single network read.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the production endpoints.
    ///
    /// # Panics
    ///
    /// Panics if the package name, version or detected OS cannot be used in
    /// a `User-Agent` header.
    #[must_use]
    pub fn new() -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let app_lang = "en".to_owned();

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
            || app_lang.chars().count() != 2
            || app_lang.contains(illegal_chars)
        {
            panic!(
                "application name, version and/or language invalid (\"{app_name}\"; \"{app_version}\"; \"{app_lang}\")"
            );
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version()
            .filter(|version| !version.is_empty() && !version.contains(illegal_chars))
            .unwrap_or_else(|| String::from("0"));
        if os_name.is_empty() || os_name.contains(illegal_chars) {
            panic!("os name invalid (\"{os_name}\")");
        }

        let user_agent =
            format!("{app_name}/{app_version} (Rust; {os_name}/{os_version}; Server; {app_lang})");
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            app_lang,

            user_agent,

            endpoints: Endpoints::default(),

            timeout: Self::DEFAULT_TIMEOUT,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
