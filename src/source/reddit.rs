//! Reddit implementation of [`Source`].
//!
//! Talks to the OAuth API with a script-app password grant.  Listings are
//! parsed by pure functions ([`parse_listing`], [`check_status`]) so tests
//! can exercise them without the network.
//!
//! A 401 from an API call means the token was revoked before its expiry:
//! the client fetches a fresh one and resends once.  The live stream's
//! buffering lives in [`LiveStream`]; this file only supplies the fetch.

use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Item, LiveStream, Source, StreamEvent};
use crate::config::RedditConfig;
use crate::error::{Fault, SourceFault, TransportFault};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Listing size used by the live stream.
const STREAM_LIMIT: usize = 100;
const SEEN_CAPACITY: usize = 301;
/// Refresh the token this long before Reddit says it expires.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// The HTTP half: token handling and the three endpoints.
struct RedditApi {
    http: Client,
    credentials: RedditConfig,
    token: Option<AccessToken>,
    token_url: String,
    api_base: String,
}

pub struct RedditSource {
    api: RedditApi,
    live: LiveStream,
}

impl RedditSource {
    pub fn new(credentials: RedditConfig) -> Result<Self, Fault> {
        Self::with_endpoints(credentials, TOKEN_URL, API_BASE)
    }

    fn with_endpoints(credentials: RedditConfig, token_url: &str, api_base: &str) -> Result<Self, Fault> {
        let http = Client::builder()
            .user_agent(user_agent(&credentials.bot_hoster))
            .timeout(REQUEST_TIMEOUT)
            // A missing subreddit answers with a redirect to the search page.
            .redirect(Policy::none())
            .build()
            .map_err(request_fault)?;
        Ok(Self {
            api: RedditApi {
                http,
                credentials,
                token: None,
                token_url: token_url.to_string(),
                api_base: api_base.to_string(),
            },
            live: LiveStream::new(SEEN_CAPACITY),
        })
    }
}

impl RedditApi {
    fn token(&mut self) -> Result<String, SourceFault> {
        if let Some(token) = &self.token {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("requesting a Reddit access token");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .map_err(request_fault)?;
        let grant: TokenResponse = read_json(response)?;
        let token = grant.into_token()?;
        let value = token.value.clone();
        self.token = Some(token);
        Ok(value)
    }

    fn send_once(&mut self, build: &impl Fn(&Client) -> RequestBuilder) -> Result<Response, SourceFault> {
        let token = self.token()?;
        build(&self.http).bearer_auth(token).send().map_err(request_fault)
    }

    /// Send with the current token.  A 401 means Reddit revoked it early:
    /// fetch a new one and resend once.
    fn send(&mut self, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response, SourceFault> {
        let response = self.send_once(&build)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("Reddit rejected the access token, requesting a new one");
        self.token = None;
        let response = self.send_once(&build)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.token = None;
            return Err(SourceFault::TokenRejected);
        }
        Ok(response)
    }

    fn newest(&mut self, limit: usize) -> Result<Vec<Item>, SourceFault> {
        let url = format!("{}/r/{}/new", self.api_base, self.credentials.subreddit);
        let limit = limit.to_string();
        tracing::info!(%url, %limit, "GET");
        let response = self.send(|http| {
            http.get(&url)
                .query(&[("limit", limit.as_str()), ("raw_json", "1")])
        })?;
        tracing::info!(status = %response.status(), %url, "GET");
        let listing: Listing = read_json(response)?;
        Ok(parse_listing(listing))
    }

    fn save(&mut self, fullname: &str) -> Result<(), SourceFault> {
        let url = format!("{}/api/save", self.api_base);
        let response = self.send(|http| http.post(&url).form(&[("id", fullname)]))?;
        tracing::info!(status = %response.status(), %url, id = fullname, "POST");
        check_status(response.status())
    }
}

impl Source for RedditSource {
    fn fetch_recent(&mut self, limit: usize) -> Result<Vec<Item>, Fault> {
        Ok(self.api.newest(limit)?)
    }

    fn poll(&mut self) -> Result<StreamEvent, Fault> {
        let api = &mut self.api;
        Ok(self.live.next(|| api.newest(STREAM_LIMIT))?)
    }

    fn mark_processed(&mut self, item: &Item) -> Result<(), Fault> {
        Ok(self.api.save(&item.fullname())?)
    }
}

/// `{os}:{name} bot:v{version} (by /u/{hoster})`.
pub fn user_agent(bot_hoster: &str) -> String {
    format!(
        "{}:{} bot:v{} (by /u/{bot_hoster})",
        std::env::consts::OS,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
}

fn request_fault(err: reqwest::Error) -> SourceFault {
    SourceFault::Request(TransportFault::from(&err))
}

/// Map a response status onto the source fault it stands for.
pub fn check_status(status: StatusCode) -> Result<(), SourceFault> {
    match status.as_u16() {
        200..=299 => Ok(()),
        300..=399 => Err(SourceFault::Redirect),
        403 => Err(SourceFault::Forbidden),
        404 => Err(SourceFault::NotFound),
        429 => Err(SourceFault::TooManyRequests),
        code @ 500..=599 => Err(SourceFault::ServerError(code)),
        code => Err(SourceFault::Response(code)),
    }
}

fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SourceFault> {
    check_status(response.status())?;
    let body = response.bytes().map_err(request_fault)?;
    serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "unparseable Reddit response");
        SourceFault::BadJson
    })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<AccessToken, SourceFault> {
        match (self.access_token, self.error) {
            (_, Some(error)) => Err(SourceFault::OAuth(error)),
            (Some(value), None) => {
                let lifetime = Duration::from_secs(self.expires_in.unwrap_or(3_600));
                Ok(AccessToken {
                    value,
                    expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_MARGIN),
                })
            }
            (None, None) => Err(SourceFault::BadJson),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    permalink: String,
    title: String,
    #[serde(default)]
    url: String,
    link_flair_text: Option<String>,
    #[serde(default)]
    author: String,
    #[serde(default)]
    saved: bool,
}

/// Convert a listing into items, keeping its newest-first order.
pub fn parse_listing(listing: Listing) -> Vec<Item> {
    listing
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == "t3")
        .map(|thing| {
            let post = thing.data;
            Item {
                id: post.id,
                permalink: post.permalink,
                title: post.title,
                url: post.url,
                flair: post.link_flair_text.filter(|f| !f.is_empty()),
                author: post.author,
                processed: post.saved,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
