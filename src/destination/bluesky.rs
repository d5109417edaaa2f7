//! Bluesky implementation of [`Destination`] over the XRPC HTTP API.
//!
//! Only the handful of endpoints the bot needs are covered: session
//! creation and refresh, blob upload and record creation.  Link previews
//! come from the public card extractor the official app uses.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{BlobRef, Destination, ExternalEmbed, LinkPreview, PublishedRecord};
use crate::compose::ComposedPost;
use crate::error::{DestinationFault, Fault};

const SERVICE: &str = "https://bsky.social";
const EXTRACT_URL: &str = "https://cardyb.bsky.app/v1/extract";
/// Blob uploads over a slow uplink can take a while.
const XRPC_TIMEOUT: Duration = Duration::from_secs(60);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    refresh_jwt: String,
    handle: String,
    did: String,
}

pub struct BlueskyClient {
    xrpc: Client,
    http: Client,
    service: String,
    session: Option<Session>,
}

impl BlueskyClient {
    pub fn new() -> Result<Self, Fault> {
        let xrpc = Client::builder()
            .timeout(XRPC_TIMEOUT)
            .build()
            .map_err(DestinationFault::from)?;
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(DestinationFault::from)?;
        Ok(Self {
            xrpc,
            http,
            service: SERVICE.to_string(),
            session: None,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/xrpc/{method}", self.service)
    }

    fn session(&self) -> Result<&Session, DestinationFault> {
        self.session
            .as_ref()
            .ok_or_else(|| DestinationFault::Unauthorized("not logged in".into()))
    }

    fn refresh(&mut self) -> Result<(), DestinationFault> {
        let refresh_jwt = self.session()?.refresh_jwt.clone();
        tracing::debug!("refreshing the Bluesky session");
        let response = self
            .xrpc
            .post(self.endpoint("com.atproto.server.refreshSession"))
            .bearer_auth(refresh_jwt)
            .send()?;
        self.session = Some(read_json(response)?);
        Ok(())
    }

    /// Send an authenticated request, refreshing the session once if the
    /// access token has expired.
    fn send_authed(
        &mut self,
        build: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<Response, DestinationFault> {
        let token = self.session()?.access_jwt.clone();
        let response = build(&self.xrpc).bearer_auth(token).send()?;
        if response.status() != StatusCode::BAD_REQUEST {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text()?;
        if xrpc_error_name(&body).as_deref() != Some("ExpiredToken") {
            return Err(status_fault(status, &body));
        }
        self.refresh()?;
        let token = self.session()?.access_jwt.clone();
        Ok(build(&self.xrpc).bearer_auth(token).send()?)
    }
}

impl Destination for BlueskyClient {
    fn login(&mut self, handle: &str, password: &str) -> Result<(), Fault> {
        let response = self
            .xrpc
            .post(self.endpoint("com.atproto.server.createSession"))
            .json(&json!({ "identifier": handle, "password": password }))
            .send()
            .map_err(DestinationFault::from)?;
        let session: Session = read_json(response)?;
        tracing::info!(handle = %session.handle, did = %session.did, "logged in to Bluesky");
        self.session = Some(session);
        Ok(())
    }

    fn handle(&self) -> &str {
        self.session.as_ref().map_or("", |s| s.handle.as_str())
    }

    fn link_preview(&mut self, url: &str) -> Result<Option<LinkPreview>, Fault> {
        let extract = Url::parse_with_params(EXTRACT_URL, &[("url", url)])
            .map_err(|e| DestinationFault::BadResponse(e.to_string()))?;
        tracing::info!(url = %extract, "GET");
        let response = self.http.get(extract.as_str()).send()?;
        let status = response.status();
        tracing::info!(%status, url = %extract, "GET");
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DestinationFault::Status(status.as_u16(), "link preview".into()).into());
        }
        let body: Value = response.json().map_err(DestinationFault::from)?;
        Ok(parse_preview(&body))
    }

    fn download(&mut self, url: &str) -> Result<Option<Vec<u8>>, Fault> {
        tracing::info!(%url, "GET");
        let response = self.http.get(url).send()?;
        tracing::info!(status = %response.status(), %url, "GET");
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        Ok(Some(response.bytes()?.to_vec()))
    }

    fn upload_blob(&mut self, bytes: &[u8]) -> Result<BlobRef, Fault> {
        let mime = image::guess_format(bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");
        let endpoint = self.endpoint("com.atproto.repo.uploadBlob");
        let response = self.send_authed(|http| {
            http.post(&endpoint)
                .header(CONTENT_TYPE, mime)
                .body(bytes.to_vec())
        })?;

        #[derive(Deserialize)]
        struct Uploaded {
            blob: BlobRef,
        }
        let uploaded: Uploaded = read_json(response)?;
        Ok(uploaded.blob)
    }

    fn publish(&mut self, post: &ComposedPost, embed: &ExternalEmbed) -> Result<PublishedRecord, Fault> {
        let repo = self.session()?.did.clone();
        let record = post_record(post, embed, &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        let body = json!({
            "repo": repo,
            "collection": "app.bsky.feed.post",
            "record": record,
        });
        let endpoint = self.endpoint("com.atproto.repo.createRecord");
        let response = self.send_authed(|http| http.post(&endpoint).json(&body))?;
        Ok(read_json(response)?)
    }
}

/// Public web URL of a created post.
pub fn post_url(handle: &str, record_uri: &str) -> String {
    let rkey = record_uri.rsplit('/').next().unwrap_or(record_uri);
    format!("https://bsky.app/profile/{handle}/post/{rkey}")
}

/// The `app.bsky.feed.post` record for `post` with `embed` attached.
pub fn post_record(post: &ComposedPost, embed: &ExternalEmbed, created_at: &str) -> Value {
    let facets: Vec<Value> = post
        .tags
        .iter()
        .map(|facet| {
            json!({
                "index": { "byteStart": facet.start, "byteEnd": facet.end },
                "features": [{ "$type": "app.bsky.richtext.facet#tag", "tag": facet.tag }],
            })
        })
        .collect();

    let mut external = json!({
        "uri": embed.uri,
        "title": embed.title,
        "description": embed.description,
    });
    if let Some(thumb) = &embed.thumb {
        external["thumb"] = thumb.0.clone();
    }

    let mut record = json!({
        "$type": "app.bsky.feed.post",
        "text": post.text,
        "createdAt": created_at,
        "embed": { "$type": "app.bsky.embed.external", "external": external },
    });
    if !facets.is_empty() {
        record["facets"] = Value::Array(facets);
    }
    record
}

/// Interpret the card extractor's answer.  `None` when it reported an error.
pub fn parse_preview(body: &Value) -> Option<LinkPreview> {
    let has_error = body
        .get("error")
        .is_some_and(|e| !e.is_null() && e.as_str() != Some(""));
    if has_error {
        return None;
    }
    let text = |key: &str| body.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let image = text("image");
    Some(LinkPreview {
        title: text("title"),
        description: text("description"),
        image: (!image.is_empty()).then_some(image),
    })
}

fn xrpc_error_name(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(String::from)
}

fn xrpc_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn status_fault(status: StatusCode, body: &str) -> DestinationFault {
    let message = xrpc_message(body);
    if status == StatusCode::UNAUTHORIZED {
        DestinationFault::Unauthorized(message)
    } else {
        DestinationFault::Status(status.as_u16(), message)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, DestinationFault> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(status_fault(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| DestinationFault::BadResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
