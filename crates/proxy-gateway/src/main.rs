use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use proxy_agent::{AdapterSummarizer, LocalAdapter, Orchestrator, OrchestratorConfig, PremiumAdapter};
use proxy_classifier::Classifier;
use proxy_core::config::ProxyConfig;
use proxy_memory::{FactExtractor, MemoryFlusher};
use proxy_retriever::{Embedder, HybridRetriever, LexicalIndexManager, VectorStore};
use proxy_sessions::{SessionManager, SessionPolicy};
use proxy_tools::{FsReadTool, FsWriteTool, McpServerDescriptor, ShellTool, TimeTool, ToolRegistry};
use proxy_workspace::WorkspaceLoader;

mod app;
mod http;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxy_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > PROXY_CONFIG env > ~/.proxy/proxy.toml
    let config_path = std::env::var("PROXY_CONFIG").ok();
    let config = ProxyConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        ProxyConfig::default()
    });

    let state = Arc::new(build_state(config).await?);
    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", state.config.gateway.bind, state.config.gateway.port).parse()?;
    info!("proxy gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Composition root: wire every component crate into a single `AppState`.
///
/// The vector DB and embedding model are external collaborators out of
/// scope here; `infra.vector_db_uri` is interpreted here as
/// a local SQLite file under the workspace directory rather than a real
/// vector DB endpoint — see `DESIGN.md` for the reasoning.
async fn build_state(config: ProxyConfig) -> anyhow::Result<app::AppState> {
    let db_path = format!("{}/proxy-memory.db", config.infra.workspace_path);
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store: Arc<dyn VectorStore> = Arc::new(store::SqliteVectorStore::open(&db_path)?);
    let embedder: Arc<dyn Embedder> = Arc::new(store::HashEmbedder);

    let workspace = Arc::new(WorkspaceLoader::new(config.infra.workspace_path.clone()));

    let lexical = Arc::new(LexicalIndexManager::new());
    match lexical.rebuild(&*store).await {
        Ok(count) => info!(docs = count, "lexical index built on startup"),
        Err(e) => warn!(error = %e, "lexical index build failed on startup"),
    }

    let retriever = Arc::new(HybridRetriever::new(
        store.clone(),
        embedder.clone(),
        lexical.clone(),
        config.identity.owner_id.clone(),
        config.retrieval.vector_weight,
        config.retrieval.bm25_weight,
    ));

    let sessions = Arc::new(SessionManager::new(SessionPolicy {
        max_messages: config.session.session_max_messages,
        idle_timeout_s: config.session.session_timeout_s,
        flush_threshold: config.budget.flush_threshold,
        prune_after_messages: config.pruning.prune_after_messages,
        prune_tool_max_chars: config.pruning.prune_tool_max_chars,
    }));

    let classifier = Arc::new(Classifier::new());

    let tools = Arc::new(ToolRegistry::new(
        config.tools.tool_timeout_s,
        config.tools.tool_output_cap,
    ));
    tools.register(Arc::new(ShellTool));
    tools.register(Arc::new(TimeTool));
    tools.register(Arc::new(FsReadTool::new(&config.infra.workspace_path)));
    tools.register(Arc::new(FsWriteTool::new(&config.infra.workspace_path)));

    let mcp_descriptors: Vec<McpServerDescriptor> = config
        .tools
        .mcp_servers
        .iter()
        .map(|s| McpServerDescriptor {
            name: s.name.clone(),
            health_url: s.health_url.clone(),
        })
        .collect();
    let mcp_client = reqwest::Client::new();
    for (name, status) in proxy_tools::mcp::init_servers(&mcp_client, &mcp_descriptors).await {
        tools.set_mcp_status(&name, status);
    }

    let fact_extractor = Arc::new(FactExtractor::new(store.clone(), embedder.clone()));
    let flusher = Arc::new(MemoryFlusher::new(store.clone(), embedder.clone(), workspace.clone()));

    let local = Arc::new(LocalAdapter::new(config.local_llm.endpoint.clone()));
    let premium = Arc::new(PremiumAdapter::new(
        config.premium_llm.api_key.clone().unwrap_or_default(),
        &config.premium_llm.base_url,
    ));

    // The flush summarizer rides the local backend — it's always configured
    // (no API key required) and a flush summary doesn't need premium quality.
    let summarizer = Arc::new(AdapterSummarizer::new(local.clone(), config.local_llm.model.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        sessions.clone(),
        workspace.clone(),
        retriever.clone(),
        classifier.clone(),
        tools.clone(),
        fact_extractor,
        flusher,
        summarizer,
        local,
        premium,
        OrchestratorConfig::from_proxy_config(&config),
    ));

    Ok(app::AppState {
        config,
        orchestrator,
        sessions,
        workspace,
        retriever,
        classifier,
        tools,
    })
}
