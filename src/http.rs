//! HTTP client with cookie management and timeouts for the provider's APIs.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Cookie management for authentication
//! * Consistent timeouts and headers
//!
//! A new client is built for every track request, so cookies set by one
//! session never leak into another.
//!
//! # Example
//!
//! ```rust
//! use dzgate::http::Client;
//!
//! // Create client with cookies for authenticated endpoints
//! let client = Client::with_cookies(&config, cookie_jar)?;
//!
//! // Or without cookies for public endpoints
//! let client = Client::without_cookies(&config)?;
//!
//! let request = client.get(url);
//! let response = client.execute(request).await?;
//! ```

use std::{future::Future, sync::Arc};

use futures_util::TryFutureExt;
use reqwest::{
    self,
    cookie::CookieStore,
    header::{HeaderValue, ACCEPT_LANGUAGE},
    Body, Method, Url,
};

use crate::{config::Config, error::Result};

/// HTTP client with optional cookie support.
pub struct Client {
    /// Underlying client.
    pub inner: reqwest::Client,
}

impl Client {
    /// Creates a new client with optional cookie storage.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new<C>(config: &Config, cookie_jar: Option<C>) -> Result<Self>
    where
        C: CookieStore + 'static,
    {
        // Not having `Accept-Language` set is non-fatal.
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(lang) = HeaderValue::from_str(&config.app_lang) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }

        let mut http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .read_timeout(config.read_timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        if let Some(jar) = cookie_jar {
            http_client = http_client.cookie_provider(Arc::new(jar));
        }

        Ok(Self {
            inner: http_client.build()?,
        })
    }

    /// Creates a new client with cookie storage.
    ///
    /// # Errors
    ///
    /// Returns error if client creation fails.
    pub fn with_cookies<C>(config: &Config, cookie_jar: C) -> Result<Self>
    where
        C: CookieStore + 'static,
    {
        Self::new(config, Some(cookie_jar))
    }

    /// Creates a new client without cookie storage, for public endpoints
    /// and CDN access.
    ///
    /// # Errors
    ///
    /// Returns error if client creation fails.
    pub fn without_cookies(config: &Config) -> Result<Self> {
        // Need to specify a type that satisfies the trait bounds.
        Self::new(config, None::<reqwest::cookie::Jar>)
    }

    /// Builds a request with specified method, URL and body.
    pub fn request<U, T>(&self, method: Method, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        let mut request = reqwest::Request::new(method, url.into());
        let body_mut = request.body_mut();
        *body_mut = Some(body.into());

        request
    }

    /// Builds a POST request.
    pub fn post<U, T>(&self, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        self.request(Method::POST, url, body)
    }

    /// Builds a GET request without a body.
    pub fn get<U>(&self, url: U) -> reqwest::Request
    where
        U: Into<Url>,
    {
        reqwest::Request::new(Method::GET, url.into())
    }

    /// Executes a request.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * Request execution fails
    /// * Network error occurs
    /// * The request times out
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        trace!("{} {}", request.method(), request.url().path());
        self.inner.execute(request).map_err(Into::into)
    }
}
