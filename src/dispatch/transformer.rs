//! Transformer / HTTP-client capabilities attached to a channel (spec §1,
//! §4.G) — wire-format translation and upstream transport are external
//! collaborators, modeled here only as traits.
//!
//! Grounded directly on the teacher's `Provider` trait
//! (`daemon/llm_gateway/providers/mod.rs`): `async fn complete(request) ->
//! Result<(Response, Metrics)>` becomes `async fn rerank(...)` here, since
//! the rerank shape is the one spec.md fully specifies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Channel, ModelPrice, Usage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankRequest {
    pub model: String,
    pub query: String,
    pub documents: Vec<String>,
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResponse {
    pub results: Vec<RerankResult>,
}

/// Upstream transport capability, shared by all channels (spec §5: "The
/// database client and HTTP client are shared by all components; they must
/// be thread-safe"). Left opaque: the dispatcher never calls it directly,
/// only passes it through to the `Transformer`.
pub trait HttpClient: Send + Sync {}

#[async_trait]
pub trait Transformer: Send + Sync {
    /// Maps a requested model name to this channel's upstream model id.
    /// Failure here is a 400-class error; the dispatcher does not retry it.
    fn map_model(&self, channel: &Channel, request_model: &str) -> Result<String>;

    /// Returns the response plus whatever usage data the upstream call
    /// reported, mirroring the teacher's `Provider::complete` returning
    /// `(Response, Metrics)`. `None` usage means the dispatcher records the
    /// execution without a `UsageLog` row (spec §4.F: "if the attempt
    /// yielded usage data").
    async fn rerank(
        &self,
        channel: &Channel,
        request: &RerankRequest,
        http_client: &dyn HttpClient,
    ) -> Result<(RerankResponse, Option<Usage>)>;
}

/// Supplies the price table the dispatcher needs to cost a successful
/// attempt (component A's input). Modeled as a trait, alongside
/// `Transformer`/`HttpClient`, since price-table storage is an external
/// collaborator (spec: persistence engine is out of scope beyond relational
/// semantics).
pub trait PriceTable: Send + Sync {
    fn price_for(&self, model_id: &str) -> Option<ModelPrice>;
}
