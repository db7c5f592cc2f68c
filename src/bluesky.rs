// Bluesky source and destination connectors over AT Protocol XRPC

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::error::ConnectorError;
use crate::models::{
    CreateRecordRequest, CreateSessionRequest, CreateSessionResponse, ListRecordsResponse,
    PostRecord, PostReference, RepoRecord, ResolveHandleResponse, TypedPost,
};

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Default)]
pub struct RecordPage {
    pub records: Vec<RepoRecord>,
    pub cursor: Option<String>,
}

#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn fetch_records(
        &self,
        account: &str,
        page_limit: usize,
        cursor: Option<&str>,
    ) -> Result<RecordPage, ConnectorError>;
}

#[async_trait]
pub trait DestinationConnector: Send + Sync {
    async fn publish(
        &self,
        text: &str,
        languages: &[String],
    ) -> Result<PostReference, ConnectorError>;
}

// Authenticated XRPC client for one account
#[derive(Clone)]
pub struct BlueskyClient {
    http: reqwest::Client,
    host_url: String,
    session: CreateSessionResponse,
}

impl BlueskyClient {
    pub async fn login(
        http: reqwest::Client,
        host_url: &str,
        handle: &str,
        password: &str,
    ) -> Result<Self, ConnectorError> {
        let host_url = host_url.trim_end_matches('/').to_string();
        debug!(handle, "Creating session");

        let res = http
            .post(format!("{host_url}/xrpc/com.atproto.server.createSession"))
            .json(&CreateSessionRequest {
                identifier: handle,
                password,
            })
            .send()
            .await
            .map_err(|e| ConnectorError::Authentication {
                handle: handle.to_string(),
                reason: e.to_string(),
            })?;

        if !res.status().is_success() {
            return Err(ConnectorError::Authentication {
                handle: handle.to_string(),
                reason: format!("server returned {}", res.status()),
            });
        }
        let session: CreateSessionResponse = res.json().await?;
        info!(handle = %session.handle, did = %session.did, "Logged in");

        Ok(Self {
            http,
            host_url,
            session,
        })
    }

    pub async fn resolve_handle(&self, handle: &str) -> Result<String, ConnectorError> {
        let res = self
            .http
            .get(format!(
                "{}/xrpc/com.atproto.identity.resolveHandle",
                self.host_url
            ))
            .query(&[("handle", handle)])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ConnectorError::Status {
                endpoint: "resolveHandle",
                status: res.status(),
            });
        }
        let body: ResolveHandleResponse = res.json().await?;
        debug!(handle, did = %body.did, "Resolved handle");
        Ok(body.did)
    }
}

#[async_trait]
impl SourceConnector for BlueskyClient {
    async fn fetch_records(
        &self,
        account: &str,
        page_limit: usize,
        cursor: Option<&str>,
    ) -> Result<RecordPage, ConnectorError> {
        let limit = page_limit.to_string();
        let mut query = vec![
            ("repo", account),
            ("collection", POST_COLLECTION),
            ("limit", limit.as_str()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let res = self
            .http
            .get(format!("{}/xrpc/com.atproto.repo.listRecords", self.host_url))
            .bearer_auth(&self.session.access_jwt)
            .query(&query)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ConnectorError::Status {
                endpoint: "listRecords",
                status: res.status(),
            });
        }
        let body: ListRecordsResponse = res.json().await?;
        Ok(RecordPage {
            records: body.records,
            cursor: body.cursor.filter(|c| !c.is_empty()),
        })
    }
}

#[async_trait]
impl DestinationConnector for BlueskyClient {
    async fn publish(
        &self,
        text: &str,
        languages: &[String],
    ) -> Result<PostReference, ConnectorError> {
        let request = CreateRecordRequest {
            repo: &self.session.did,
            collection: POST_COLLECTION,
            record: TypedPost {
                kind: POST_COLLECTION,
                post: PostRecord {
                    text: text.to_string(),
                    created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
                    langs: languages.to_vec(),
                },
            },
        };

        let res = self
            .http
            .post(format!("{}/xrpc/com.atproto.repo.createRecord", self.host_url))
            .bearer_auth(&self.session.access_jwt)
            .json(&request)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ConnectorError::Status {
                endpoint: "createRecord",
                status: res.status(),
            });
        }
        Ok(res.json().await?)
    }
}

// A failure on the first page is returned; a later one keeps what was retrieved
pub async fn retrieve_posts(
    source: &dyn SourceConnector,
    account: &str,
    page_limit: usize,
    max_pages: usize,
) -> Result<Vec<RepoRecord>, ConnectorError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;

    for page in 0..max_pages {
        let fetched = match source.fetch_records(account, page_limit, cursor.as_deref()).await {
            Ok(fetched) => fetched,
            Err(e) if page == 0 => return Err(e),
            Err(e) => {
                warn!(error = %e, retrieved = records.len(), "Fetch interrupted, keeping partial result");
                break;
            }
        };
        if fetched.records.is_empty() {
            break;
        }

        debug!(page, count = fetched.records.len(), "Fetched records");
        records.extend(fetched.records);
        match fetched.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(account, total = records.len(), "Retrieved source posts");
    Ok(records)
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub fn record(text: &str) -> RepoRecord {
        RepoRecord {
            uri: format!("at://did:plc:source/app.bsky.feed.post/{}", text.len()),
            value: PostRecord {
                text: text.to_string(),
                ..PostRecord::default()
            },
        }
    }

    // Pages in order, `None` fails. A repeating source always serves page 0.
    pub struct ScriptedSource {
        pages: Mutex<Vec<Option<Vec<RepoRecord>>>>,
        repeat: bool,
        pub calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(pages: Vec<Option<Vec<RepoRecord>>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                repeat: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn repeating(texts: &[&str]) -> Self {
            Self {
                repeat: true,
                ..Self::new(vec![Some(texts.iter().map(|t| record(t)).collect())])
            }
        }

        pub fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceConnector for ScriptedSource {
        async fn fetch_records(
            &self,
            _account: &str,
            _page_limit: usize,
            _cursor: Option<&str>,
        ) -> Result<RecordPage, ConnectorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let pages = self.pages.lock().unwrap();
            if self.repeat {
                return Ok(RecordPage {
                    records: pages[0].clone().unwrap_or_default(),
                    cursor: None,
                });
            }
            match pages.get(call) {
                Some(Some(records)) => Ok(RecordPage {
                    records: records.clone(),
                    cursor: (call + 1 < pages.len()).then(|| format!("cursor-{}", call + 1)),
                }),
                Some(None) => Err(ConnectorError::Status {
                    endpoint: "listRecords",
                    status: reqwest::StatusCode::BAD_GATEWAY,
                }),
                None => Ok(RecordPage::default()),
            }
        }
    }

    #[derive(Default)]
    pub struct RecordingDestination {
        pub published: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingDestination {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn count(&self) -> usize {
            self.published.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DestinationConnector for RecordingDestination {
        async fn publish(
            &self,
            text: &str,
            _languages: &[String],
        ) -> Result<PostReference, ConnectorError> {
            if self.fail {
                return Err(ConnectorError::Status {
                    endpoint: "createRecord",
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
            let mut published = self.published.lock().unwrap();
            published.push(text.to_string());
            Ok(PostReference {
                uri: format!("at://did:plc:dest/app.bsky.feed.post/{}", published.len()),
                cid: "bafyfake".to_string(),
            })
        }
    }
}
