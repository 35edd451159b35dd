use serde::Deserialize;

/// Wire types for the Bluesky XRPC endpoints we call. Only the fields the
/// pipeline consumes are modeled; everything else is ignored.

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSession {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSearchPage {
    #[serde(default)]
    pub posts: Vec<ApiPost>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPost {
    pub uri: String,
    pub author: ApiAuthor,
    pub record: ApiRecord,
    #[serde(rename = "replyCount")]
    pub reply_count: Option<u32>,
    #[serde(rename = "quoteCount")]
    pub quote_count: Option<u32>,
    #[serde(rename = "repostCount")]
    pub repost_count: Option<u32>,
    pub embed: Option<ApiEmbed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiAuthor {
    pub handle: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRecord {
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEmbed {
    #[serde(rename = "$type")]
    pub embed_type: Option<String>,
}
