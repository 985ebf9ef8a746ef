use std::str::FromStr;
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::core::config::PolicyGraphConfig;
use crate::core::engine::{PolicyGraphEngine, SearchOptions};
use crate::core::error::PolicyGraphError;
use crate::core::search_modes::SearchMode;

const CONFIG_URI: &str = "config://policygraph";
const STATUS_URI: &str = "status://graph";


#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SearchPolicyParams {
    #[schemars(description = "Question about Seoul youth policy, in Korean or English")]
    pub query: String,
    #[schemars(description = "Search mode: 'focused', 'balanced' (default), 'broad'")]
    pub mode: Option<String>,
    #[schemars(description = "Embed a drafted answer instead of the raw question (HyDE)")]
    pub use_hyde: Option<bool>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct GraphOverviewParams {
    #[schemars(description = "Maximum number of nodes (default: 400)")]
    pub node_limit: Option<u32>,
}


#[derive(Clone)]
pub struct PolicyGraphMcpServer {
    engine: Arc<PolicyGraphEngine>,
    tool_router: ToolRouter<Self>,
}

impl PolicyGraphMcpServer {

    pub fn new(engine: Arc<PolicyGraphEngine>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }


    fn convert_error(err: PolicyGraphError) -> McpError {
        match err {
            PolicyGraphError::Validation(msg) | PolicyGraphError::Config(msg) => McpError::invalid_params(msg, None),
            PolicyGraphError::NotFound(msg) => McpError::resource_not_found(msg, None),
            PolicyGraphError::UpstreamUnavailable { service, message } => McpError::internal_error(
                format!("{service} unavailable: {message}"),
                Some(json!({ "service": service, "retryable": true })),
            ),
            other => McpError::internal_error(other.to_string(), None),
        }
    }


    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))
    }


    fn parse_mode(raw: Option<&str>) -> Result<Option<SearchMode>, McpError> {
        raw.map(|m| {
            SearchMode::from_str(m.trim())
                .map_err(|_| McpError::invalid_params(format!("Unknown search mode: {m}"), None))
        })
        .transpose()
    }


    fn config_json(config: &PolicyGraphConfig) -> serde_json::Value {
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "store": {
                "backend": config.store_backend,
                "helix": config.helix_base_url(),
                "seed_path": config.seed_path,
            },
            "embedding": {
                "provider": config.embedding_provider,
                "model": config.embedding_model,
                "fallback": config.embedding_fallback_enabled.then(|| config.embedding_fallback_model.clone()),
            },
            "llm": {
                "provider": config.llm_provider,
                "model": config.llm_model,
                "fallback": config.llm_fallback_enabled.then(|| config.llm_fallback_model.clone()),
            },
            "retrieval": {
                "search_mode": config.search_mode,
                "document_top_k": config.document_top_k,
                "complaint_top_k": config.complaint_top_k,
                "min_hit_score": config.min_hit_score,
                "max_context_chars": config.max_context_chars,
                "content_excerpt_chars": config.content_excerpt_chars,
                "use_hyde": config.use_hyde,
            },
            "linker": {
                "top_k": config.link_top_k,
                "min_score": config.link_min_score,
            },
            "tools": ["search_policy", "get_graph_overview", "rebuild_complaint_links"],
        })
    }
}

#[tool_router]
impl PolicyGraphMcpServer {

    #[tool(description = "Answer a youth-policy question from official documents and citizen complaints, citing responsible departments. Returns: {answer, sources: [{type, id, title, score}], confidence, coverage, hypothetical_document?}")]
    async fn search_policy(
        &self,
        Parameters(params): Parameters<SearchPolicyParams>,
    ) -> Result<CallToolResult, McpError> {
        let mode = Self::parse_mode(params.mode.as_deref())?;
        info!(
            "Searching: '{}' [mode={:?}, hyde={:?}]",
            crate::safe_truncate(&params.query, 50),
            mode,
            params.use_hyde
        );

        let response = self
            .engine
            .search(
                &params.query,
                SearchOptions {
                    mode,
                    use_hyde: params.use_hyde,
                },
            )
            .await
            .map_err(Self::convert_error)?;

        info!(
            "Answered with {} sources ({}, {})",
            response.sources.len(),
            response.confidence,
            response.coverage
        );

        let json = Self::result_to_json(&response)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }


    #[tool(description = "Graph snapshot for visualization. Returns: {nodes: [{id, label, title, preview}], edges: [{from, to, type}]}")]
    async fn get_graph_overview(
        &self,
        Parameters(params): Parameters<GraphOverviewParams>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = self
            .engine
            .graph_overview(params.node_limit.map(|n| n as usize))
            .await
            .map_err(Self::convert_error)?;

        info!("Graph overview: {} nodes, {} edges", snapshot.nodes.len(), snapshot.edges.len());

        let json = Self::result_to_json(&snapshot)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }


    #[tool(description = "Rebuild every complaint's RELATED_TO links to its most similar documents. Returns the link report")]
    async fn rebuild_complaint_links(&self) -> Result<CallToolResult, McpError> {
        info!("Rebuilding complaint links");

        let report = self.engine.link_complaints().await.map_err(Self::convert_error)?;
        if report.complaints_failed > 0 {
            warn!("{} complaints could not be linked", report.complaints_failed);
        }

        let json = Self::result_to_json(&report)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}


#[tool_handler]
impl ServerHandler for PolicyGraphMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().enable_resources().build(),
            server_info: Implementation {
                name: "policygraph".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Seoul youth-policy assistant. Use search_policy to answer questions from policy documents \
                 and related citizen complaints, get_graph_overview to inspect the knowledge graph, and \
                 rebuild_complaint_links after complaints or documents change."
                    .to_string(),
            ),
        }
    }


    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new(CONFIG_URI, "policygraph-config".to_string()).no_annotation(),
                RawResource::new(STATUS_URI, "graph-status".to_string()).no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let value = match uri.as_str() {
            CONFIG_URI => Self::config_json(self.engine.config()),
            STATUS_URI => {
                let store = self.engine.store();
                let health = store.health_check().await;
                json!({
                    "backend": store.backend_name(),
                    "status": if health.is_ok() { "connected" } else { "unavailable" },
                    "error": health.err().map(|e| e.to_string()),
                })
            }
            _ => {
                return Err(McpError::resource_not_found(
                    format!("Unknown resource: {}", uri),
                    Some(json!({ "uri": uri })),
                ));
            }
        };

        let content = Self::result_to_json(&value)?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(content, uri)],
        })
    }
}


pub async fn run_server() -> anyhow::Result<()> {
    info!("Initializing policygraph MCP server...");

    let config = PolicyGraphConfig::load()?;
    let engine = Arc::new(PolicyGraphEngine::new(config).await?);
    engine.initialize().await?;

    let config = engine.config();
    info!("policygraph MCP server ready");
    info!("   store: {} ({})", config.store_backend, config.helix_base_url());
    info!("   embedding: {}/{}", config.embedding_provider, config.embedding_model);
    info!("   llm: {}/{}", config.llm_provider, config.llm_model);

    let server = PolicyGraphMcpServer::new(engine.clone());
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    engine.shutdown().await?;
    Ok(())
}
