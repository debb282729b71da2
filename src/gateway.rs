//! Request-scoped session with the provider's gateway API.
//!
//! A [`Gateway`] is created for a single track request, logs in with the
//! credential, and is dropped with the request. Sessions are never cached or
//! shared: concurrent requests each log in on their own.

use std::fmt::Debug;

use reqwest::{
    self,
    header::{HeaderValue, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    arl::Arl,
    config::{Config, Endpoints},
    error::{Error, ErrorKind, Result},
    http::Client as HttpClient,
    protocol::{
        self, api,
        gateway::{self, list_data, song_data, ListData, Method, SongData, UserData},
    },
    track::TrackId,
};

pub struct Gateway {
    http_client: HttpClient,
    endpoints: Endpoints,
    user_data: Option<UserData>,
}

impl Gateway {
    /// The gateway version.
    const GATEWAY_VERSION: &'static str = "1.0";

    /// The gateway input type.
    const GATEWAY_INPUT: usize = 3;

    /// The `Content-Type` header value for gateway requests.
    ///
    /// Although the bodies of all gateway requests are JSON, the
    /// `Content-Type` is not.
    const PLAIN_TEXT_CONTENT: HeaderValue = HeaderValue::from_static("text/plain;charset=UTF-8");

    /// An empty JSON object that is used as the default body for gateway
    /// requests.
    const EMPTY_JSON_OBJECT: &'static str = "{}";

    /// Creates a new `reqwest::cookie::Jar` containing the credential and
    /// language cookies, scoped to the gateway origin.
    fn cookie_jar(config: &Config, arl: &Arl) -> reqwest::cookie::Jar {
        let cookie_jar = reqwest::cookie::Jar::default();
        let cookie_origin = &config.endpoints.gateway;

        let lang_cookie = format!("dz_lang={}; Path=/; HttpOnly", &config.app_lang);
        cookie_jar.add_cookie_str(&lang_cookie, cookie_origin);

        let arl_cookie = format!("arl={arl}; Path=/; HttpOnly");
        cookie_jar.add_cookie_str(&arl_cookie, cookie_origin);

        cookie_jar
    }

    /// Creates a session for one request. Does not log in yet.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be built.
    pub fn new(config: &Config, arl: &Arl) -> Result<Self> {
        let cookie_jar = Self::cookie_jar(config, arl);
        let http_client = HttpClient::with_cookies(config, cookie_jar)?;

        Ok(Self {
            http_client,
            endpoints: config.endpoints.clone(),
            user_data: None,
        })
    }

    /// Validates the credential and obtains the API token for this session.
    ///
    /// # Errors
    ///
    /// Will return an authentication error if the gateway does not return a
    /// non-zero user ID. There is no retry: the credential has to be
    /// replaced.
    pub async fn login(&mut self) -> Result<&UserData> {
        let user_data = self
            .request::<UserData>(Self::EMPTY_JSON_OBJECT)
            .await
            .map_err(|e| match e.kind {
                ErrorKind::DataLoss => {
                    Error::unauthenticated(format!("{e}: please refresh your arl"))
                }
                _ => e,
            })?;

        if user_data.user.id == 0 {
            return Err(Error::unauthenticated(
                "arl is invalid or expired: please refresh your arl",
            ));
        }

        if user_data.api_token.is_empty() {
            warn!("gateway returned no api token");
        }

        debug!("logged in as user {}", user_data.user.id);
        Ok(&*self.user_data.insert(user_data))
    }

    #[must_use]
    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    /// Fetches the gateway metadata of a track: its token, origin hash,
    /// media version and file sizes.
    ///
    /// # Errors
    ///
    /// Will return a metadata error if the response has no results or the
    /// results are malformed.
    pub async fn song_data(&self, track_id: TrackId) -> Result<SongData> {
        let body = serde_json::to_string(&song_data::Request { song_id: track_id })?;
        self.request::<SongData>(body).await
    }

    /// Looks up a direct media source for a track token.
    ///
    /// Returns `None` when the gateway has no source for it, including when
    /// it answers with an error instead of results.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the request fails, the gateway does not answer
    /// with a success status, or the body is not a gateway response.
    pub async fn list_data(&self, track_token: &str) -> Result<Option<Url>> {
        let body = serde_json::to_string(&list_data::Request::with_track_token(track_token))?;
        let envelope = self.envelope::<ListData>(body).await?;
        match envelope.into_results::<ListData>() {
            Ok(list) => {
                trace!("{}: {list:#?}", ListData::METHOD);
                Ok(list.first_source().cloned())
            }
            Err(e) => {
                debug!("no direct media source: {e}");
                Ok(None)
            }
        }
    }

    /// Fetches the display metadata of a track from the public API.
    ///
    /// # Errors
    ///
    /// Will return a not found error if the API does not answer with a
    /// success status, or reports an error in the body.
    pub async fn public_track(&self, track_id: TrackId) -> Result<api::PublicTrack> {
        let url = self.endpoints.api.join(&format!("track/{track_id}"))?;
        let request = self.http_client.get(url);
        let response = self.http_client.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::not_found(format!(
                "track {track_id} not found (HTTP {status})"
            )));
        }

        let body = response.text().await?;
        match protocol::json::<api::Response>(&body, "track")? {
            api::Response::Track(track) => Ok(track),
            api::Response::Error { error } => {
                Err(Error::not_found(format!("track {track_id} not found: {error}")))
            }
        }
    }

    /// Calls gateway method `T` and returns its results.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the HTTP request fails or does not return a success status
    /// - the response has no results or reports an error
    /// - the results cannot be parsed as `T`
    pub async fn request<T>(&self, body: impl Into<reqwest::Body>) -> Result<T>
    where
        T: Debug + Method + DeserializeOwned,
    {
        let results = self.envelope::<T>(body).await?.into_results::<T>()?;
        trace!("{}: {results:#?}", T::METHOD);

        Ok(results)
    }

    /// Calls gateway method `T` and returns the unchecked response envelope.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP request fails, does not return a success
    /// status, or the body is not a gateway response.
    async fn envelope<T: Method>(
        &self,
        body: impl Into<reqwest::Body>,
    ) -> Result<gateway::Response> {
        // Get the API token from the user data or use an empty string.
        let api_token = self
            .user_data
            .as_ref()
            .map(|data| data.api_token.as_str())
            .unwrap_or_default();

        let mut url = self.endpoints.gateway.clone();
        url.query_pairs_mut()
            .append_pair("method", T::METHOD)
            .append_pair("input", &Self::GATEWAY_INPUT.to_string())
            .append_pair("api_version", Self::GATEWAY_VERSION)
            .append_pair("api_token", api_token);

        let mut request = self.http_client.post(url, body);
        request
            .headers_mut()
            .try_insert(CONTENT_TYPE, Self::PLAIN_TEXT_CONTENT)?;

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::metadata(format!(
                "{}: gateway returned HTTP {status}",
                T::METHOD
            )));
        }

        let body = response.text().await?;

        // User data carries session tokens: keep the raw body out of the
        // logs.
        let redacted = T::METHOD == UserData::METHOD;
        if redacted {
            Ok(serde_json::from_str::<gateway::Response>(&body)?)
        } else {
            protocol::json::<gateway::Response>(&body, T::METHOD)
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{body_json, header_regex, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    async fn config_for(server: &MockServer) -> Config {
        let endpoints = Endpoints::new(
            Url::parse(&format!("{}/ajax/gw-light.php", server.uri())).unwrap(),
            Url::parse(&format!("{}/api/", server.uri())).unwrap(),
        )
        .unwrap();
        Config::new().with_endpoints(endpoints)
    }

    fn arl() -> Arl {
        "test-arl".parse().unwrap()
    }

    #[tokio::test]
    async fn login_sends_credential_and_keeps_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ajax/gw-light.php"))
            .and(query_param("method", "deezer.getUserData"))
            .and(query_param("api_token", ""))
            .and(header_regex("cookie", "arl=test-arl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "results": {"USER": {"USER_ID": 1234}, "checkForm": "form-token"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(query_param("method", "song.getData"))
            .and(query_param("api_token", "form-token"))
            .and(body_json(serde_json::json!({"sng_id": "3135556"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "results": {"SNG_ID": "3135556", "TRACK_TOKEN": "tt", "FILESIZE_FLAC": "10"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let mut gateway = Gateway::new(&config, &arl()).unwrap();
        let user = gateway.login().await.unwrap();
        assert_eq!(user.user.id, 1234);

        let song = gateway.song_data("3135556".parse().unwrap()).await.unwrap();
        assert_eq!(song.track_token, "tt");
        assert_eq!(song.file_sizes(), [0, 0, 10]);
    }

    #[tokio::test]
    async fn zero_user_id_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "results": {"USER": {"USER_ID": 0}, "checkForm": 0}
            })))
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let mut gateway = Gateway::new(&config, &arl()).unwrap();
        let err = gateway.login().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
        assert!(gateway.user_data().is_none());
    }

    #[tokio::test]
    async fn missing_user_data_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"VALID_TOKEN_REQUIRED": "invalid api token"}
            })))
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let mut gateway = Gateway::new(&config, &arl()).unwrap();
        let err = gateway.login().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn song_data_without_results_is_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("method", "song.getData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"DATA_ERROR": "song_id"}
            })))
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let gateway = Gateway::new(&config, &arl()).unwrap();
        let err = gateway
            .song_data("42".parse().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataLoss);
    }

    #[tokio::test]
    async fn list_data_sends_token_as_song_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("method", "song.getListData"))
            .and(body_json(serde_json::json!({"sng_ids": ["track-token"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "results": {
                    "data": [{"MEDIA": [{"TYPE": "full", "HREF": "https://cdn.example.com/a.mp3"}]}],
                    "count": 1,
                    "total": 1
                }
            })))
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let gateway = Gateway::new(&config, &arl()).unwrap();
        let url = gateway.list_data("track-token").await.unwrap();
        assert_eq!(url.unwrap().as_str(), "https://cdn.example.com/a.mp3");
    }

    #[tokio::test]
    async fn list_data_error_means_no_source() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"DATA_ERROR": "sng_ids"},
                "results": {}
            })))
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let gateway = Gateway::new(&config, &arl()).unwrap();
        assert!(gateway.list_data("track-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_data_transport_failures_are_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({"sng_ids": ["broken-body"]})))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({"sng_ids": ["server-error"]})))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let gateway = Gateway::new(&config, &arl()).unwrap();
        for token in ["broken-body", "server-error"] {
            assert!(gateway.list_data(token).await.is_err(), "{token}");
        }
    }

    #[tokio::test]
    async fn public_track_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/track/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/track/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"type": "DataException", "message": "no data", "code": 800}
            })))
            .mount(&server)
            .await;

        let config = config_for(&server).await;
        let gateway = Gateway::new(&config, &arl()).unwrap();
        for id in ["1", "2"] {
            let err = gateway
                .public_track(id.parse().unwrap())
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::NotFound, "track {id}");
        }
    }
}
