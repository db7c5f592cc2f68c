use serde::{Deserialize, Serialize};

// Ollama API request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
}

// Ollama API response format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateResponse {
    pub model: String,
    pub response: String,
}

// com.atproto.server.createSession
#[derive(Serialize, Debug)]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
}

// com.atproto.identity.resolveHandle
#[derive(Deserialize, Debug)]
pub struct ResolveHandleResponse {
    pub did: String,
}

// com.atproto.repo.listRecords
#[derive(Deserialize, Debug)]
pub struct ListRecordsResponse {
    #[serde(default)]
    pub records: Vec<RepoRecord>,
    pub cursor: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RepoRecord {
    pub uri: String,
    pub value: PostRecord,
}

// app.bsky.feed.post, only the fields the bot reads or writes
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub langs: Vec<String>,
}

// com.atproto.repo.createRecord
#[derive(Serialize, Debug)]
pub struct CreateRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'a str,
    pub record: TypedPost<'a>,
}

#[derive(Serialize, Debug)]
pub struct TypedPost<'a> {
    #[serde(rename = "$type")]
    pub kind: &'a str,
    #[serde(flatten)]
    pub post: PostRecord,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PostReference {
    pub uri: String,
    pub cid: String,
}
