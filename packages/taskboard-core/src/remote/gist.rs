/// Remote tier backed by a GitHub gist, reached over HTTPS with the user's
/// bearer token.
///
/// The board lives in a secret gist holding one file `kanban.json` with the
/// description `Kanban Board Data`. That pair is the discovery key: any device
/// holding a token for the same account finds the same gist.
///
/// Endpoints used:
///   GET   /user                 credential check
///   GET   /gists?per_page=100   discovery (first page only)
///   POST  /gists                create
///   PATCH /gists/{id}           replace file content
///   GET   /gists/{id}           pull (plus raw_url when content is truncated)
use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{RemoteAdapter, RemoteHandle, SyncError};
use crate::config::SyncConfig;
use crate::migrate;
use crate::sync::state::{AdapterKind, Credential};
use crate::types::BoardDocument;

pub const GIST_FILENAME: &str = "kanban.json";
pub const GIST_DESCRIPTION: &str = "Kanban Board Data";
const LIST_PAGE_SIZE: u32 = 100;
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct GistUser {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Gist {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

impl Gist {
    fn is_board(&self) -> bool {
        self.description.as_deref() == Some(GIST_DESCRIPTION) && self.files.contains_key(GIST_FILENAME)
    }
}

pub struct GistAdapter {
    client: reqwest::Client,
    api_url: String,
    credential: Credential,
}

impl GistAdapter {
    pub fn new(credential: Credential, config: &SyncConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.remote_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            api_url: config.gist_api_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(self.credential.expose())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Map non-success statuses onto the sync taxonomy.
    async fn check(response: Response, what: &str) -> Result<Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => Err(SyncError::CredentialInvalid),
            StatusCode::NOT_FOUND => Err(SyncError::NotFound(what.to_string())),
            _ => Err(SyncError::Http {
                status: status.as_u16(),
                message: format!("{}: {}", what, body.trim()),
            }),
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> Result<T, SyncError> {
        response
            .json()
            .await
            .map_err(|e| SyncError::Unavailable(format!("unexpected {} response: {}", what, e)))
    }

    /// Confirm the token belongs to a user. A rejected token is terminal for
    /// this tier until the user replaces it.
    pub async fn validate_credential(&self) -> Result<(), SyncError> {
        let response = self
            .request(Method::GET, &self.endpoint("/user"))
            .send()
            .await?;
        let response = Self::check(response, "credential check").await?;
        let user: GistUser = Self::json(response, "user").await?;
        log::debug!(target: "taskboard.remote.gist", "Credential valid for {}", user.login);
        Ok(())
    }

    async fn find_board_gist(&self) -> Result<Option<RemoteHandle>, SyncError> {
        let response = self
            .request(Method::GET, &self.endpoint("/gists"))
            .query(&[("per_page", LIST_PAGE_SIZE)])
            .send()
            .await?;
        let response = Self::check(response, "list gists").await?;
        let gists: Vec<Gist> = Self::json(response, "gist list").await?;
        Ok(gists
            .into_iter()
            .find(Gist::is_board)
            .map(|g| RemoteHandle::new(g.id)))
    }

    async fn create(&self, record: &str) -> Result<RemoteHandle, SyncError> {
        let body = json!({
            "description": GIST_DESCRIPTION,
            "public": false,
            "files": { GIST_FILENAME: { "content": record } },
        });
        let response = self
            .request(Method::POST, &self.endpoint("/gists"))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "create gist").await?;
        let gist: Gist = Self::json(response, "created gist").await?;
        log::info!(target: "taskboard.remote.gist", "Created board gist {}", gist.id);
        Ok(RemoteHandle::new(gist.id))
    }

    async fn update(&self, handle: &RemoteHandle, record: &str) -> Result<(), SyncError> {
        let body = json!({ "files": { GIST_FILENAME: { "content": record } } });
        let response = self
            .request(Method::PATCH, &self.endpoint(&format!("/gists/{}", handle)))
            .json(&body)
            .send()
            .await?;
        Self::check(response, &format!("gist {}", handle)).await?;
        log::info!(target: "taskboard.remote.gist", "Updated board gist {}", handle);
        Ok(())
    }
}

#[async_trait]
impl RemoteAdapter for GistAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Gist
    }

    async fn push(
        &self,
        doc: &BoardDocument,
        known: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError> {
        let record = migrate::encode_record(doc)?;

        if let Some(handle) = known {
            match self.update(handle, &record).await {
                Ok(()) => return Ok(handle.clone()),
                Err(SyncError::NotFound(_)) => log::warn!(
                    target: "taskboard.remote.gist",
                    "Remembered gist {} is gone, looking for another board gist",
                    handle
                ),
                Err(e) => return Err(e),
            }
        }

        // Another device may have created the gist since this session started.
        if let Some(found) = self.discover().await? {
            self.update(&found, &record).await?;
            return Ok(found);
        }
        self.create(&record).await
    }

    async fn pull(&self, handle: &RemoteHandle) -> Result<BoardDocument, SyncError> {
        let what = format!("gist {}", handle);
        let response = self
            .request(Method::GET, &self.endpoint(&format!("/gists/{}", handle)))
            .send()
            .await?;
        let response = Self::check(response, &what).await?;
        let gist: Gist = Self::json(response, "gist").await?;

        let file = gist
            .files
            .get(GIST_FILENAME)
            .ok_or_else(|| SyncError::NotFound(format!("{} in {}", GIST_FILENAME, what)))?;

        let content = match (&file.content, file.truncated, &file.raw_url) {
            (Some(content), false, _) => content.clone(),
            (_, _, Some(raw_url)) => {
                log::debug!(target: "taskboard.remote.gist", "Fetching full content of {}", what);
                // The raw host is named by the response; the token stays with the API.
                let response = self.client.get(raw_url).send().await?;
                Self::check(response, "raw gist content").await?.text().await?
            }
            (Some(content), true, None) => content.clone(),
            (None, _, None) => {
                return Err(SyncError::Unavailable(format!("{} has no content", what)))
            }
        };

        Ok(migrate::decode_record(&content)?)
    }

    async fn discover(&self) -> Result<Option<RemoteHandle>, SyncError> {
        self.validate_credential().await?;
        let found = self.find_board_gist().await?;
        match &found {
            Some(handle) => log::info!(target: "taskboard.remote.gist", "Discovered board gist {}", handle),
            None => log::info!(target: "taskboard.remote.gist", "No board gist found"),
        }
        Ok(found)
    }
}
