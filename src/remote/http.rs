use std::time::Duration;

use anyhow::{anyhow, Result};
use percent_encoding::percent_decode_str;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::Deserialize;

use super::{RemoteGateway, RemotePayload};
use crate::config::SyncConfig;
use crate::db::RecordKind;
use crate::error::{NotFound, Rejected};

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    records: Vec<RemotePayload>,
}

#[derive(Debug, Deserialize)]
struct PutObjectResponse {
    url: String,
}

/// Appends `/`-separated `segments` to `base_url`, percent-encoding each segment.
pub fn join_base_url_and_segments(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url.trim()).map_err(|_| anyhow!("invalid base_url"))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| anyhow!("base_url cannot be a base"))?;
        path.pop_if_empty();
        for segment in segments {
            for part in segment.split('/').filter(|p| !p.is_empty()) {
                path.push(part);
            }
        }
    }
    Ok(url)
}

/// REST gateway: records under `/v1/records/{kind}`, objects under `/v1/objects/{path}`.
pub struct HttpRemoteGateway {
    client: Client,
    target_id: String,
    base_url: String,
    id_token: String,
}

impl HttpRemoteGateway {
    pub fn new(base_url: String, id_token: String, request_timeout: Duration) -> Result<Self> {
        let mut sanitized = Url::parse(base_url.trim()).map_err(|_| anyhow!("invalid base_url"))?;
        let _ = sanitized.set_username("");
        let _ = sanitized.set_password(None);
        sanitized.set_query(None);
        sanitized.set_fragment(None);
        let base_url = sanitized.to_string();
        let target_id = format!("http:{base_url}");

        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            target_id,
            base_url,
            id_token,
        })
    }

    /// Uses the per-call timeout persisted in the local store's sync settings.
    pub fn from_config(base_url: String, id_token: String, config: &SyncConfig) -> Result<Self> {
        Self::new(base_url, id_token, config.request_timeout)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = join_base_url_and_segments(&self.base_url, segments)?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(&self.id_token))
    }

}

fn check_status(resp: Response, path: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status.as_u16() == 404 {
        return Err(NotFound {
            path: path.to_string(),
        }
        .into());
    }
    let body = resp.text().unwrap_or_default();
    if status.is_client_error() {
        return Err(Rejected {
            path: path.to_string(),
            status: status.as_u16(),
            message: body,
        }
        .into());
    }
    Err(anyhow!("{path} failed: HTTP {status} {body}"))
}

impl RemoteGateway for HttpRemoteGateway {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn upsert(&self, kind: RecordKind, payload: &RemotePayload) -> Result<()> {
        let path = format!("records/{kind}/{}", payload.id);
        let resp = self
            .request(Method::PUT, &["v1", "records", kind.as_str(), payload.id.as_str()])?
            .json(payload)
            .send()?;
        check_status(resp, &path)?;
        Ok(())
    }

    fn delete(&self, kind: RecordKind, id: &str) -> Result<()> {
        let path = format!("records/{kind}/{id}");
        let resp = self
            .request(Method::DELETE, &["v1", "records", kind.as_str(), id])?
            .send()?;
        check_status(resp, &path)?;
        Ok(())
    }

    fn list_all(&self, kind: RecordKind) -> Result<Vec<RemotePayload>> {
        let path = format!("records/{kind}");
        let resp = self
            .request(Method::GET, &["v1", "records", kind.as_str()])?
            .send()?;
        let resp = check_status(resp, &path)?;
        let parsed: ListRecordsResponse = serde_json::from_slice(resp.bytes()?.as_ref())?;
        Ok(parsed.records)
    }

    fn put_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let resp = self
            .request(Method::PUT, &["v1", "objects", path])?
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()?;
        let resp = check_status(resp, path)?;
        let parsed: PutObjectResponse = serde_json::from_slice(resp.bytes()?.as_ref())?;
        if !parsed.url.starts_with("https://") && !parsed.url.starts_with("http://") {
            return Err(anyhow!("object store returned a non-absolute url: {}", parsed.url));
        }
        Ok(parsed.url)
    }

    fn delete_object(&self, path: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, &["v1", "objects", path])?
            .send()?;
        check_status(resp, path)?;
        Ok(())
    }

    fn object_path_from_url(&self, url: &str) -> Option<String> {
        let objects = join_base_url_and_segments(&self.base_url, &["v1", "objects"]).ok()?;
        let url = Url::parse(url.trim()).ok()?;
        if url.origin() != objects.origin() {
            return None;
        }

        let mut segments = url.path_segments()?;
        for expected in objects.path_segments()? {
            if segments.next()? != expected {
                return None;
            }
        }
        let parts: Vec<String> = segments
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}
