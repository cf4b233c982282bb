//! Subcommand implementations.
//!
//! Every command loads the state it needs from the state directory, runs
//! the agent once and saves the state back, also when the agent failed.
//! In watch mode every tick is such an invocation, so state written by
//! other commands between two ticks is picked up instead of overwritten.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use tracing::info;
use yagent_agents::{
    AgentConfig, CompletionAgent, EmbeddingClassifier, Event, EventLog, MemoryStore,
    SemanticSearch,
};
use yagent_embeddings::YandexEmbeddingProvider;
use yagent_operations::{OperationTracker, PendingOperations, YandexGptClient};

const LABELS_STORE: &str = "labels";
const DOCUMENTS_STORE: &str = "documents";

/// Configuration plus state directory shared by all commands.
pub struct Context {
    config: AgentConfig,
    memory: MemoryStore,
    base_url: Option<String>,
}

impl Context {
    pub fn new(config: AgentConfig, state_dir: &Path) -> Self {
        Self {
            config,
            memory: MemoryStore::new(state_dir),
            base_url: None,
        }
    }

    /// Send every API request to another host.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn embedding_provider(&self) -> YandexEmbeddingProvider {
        let credentials = &self.config.credentials;
        let provider = YandexEmbeddingProvider::new(credentials.folder_id.clone())
            .with_api_key(credentials.api_key.clone());
        match &self.base_url {
            Some(url) => provider.with_base_url(url.clone()),
            None => provider,
        }
    }

    fn completion_client(&self, model_name: &str, model_version: &str) -> YandexGptClient {
        let credentials = &self.config.credentials;
        let client = YandexGptClient::new(credentials.folder_id.clone())
            .with_api_key(credentials.api_key.clone())
            .with_model(model_name, model_version);
        match &self.base_url {
            Some(url) => client.with_base_url(url.clone()),
            None => client,
        }
    }

    pub async fn classify(&self, event: Event, text: &str) -> anyhow::Result<()> {
        let config = self
            .config
            .classifier
            .clone()
            .context("the config has no [classifier] table")?;

        let store = self.memory.load_vectors(LABELS_STORE, config.cache).await?;
        let mut classifier =
            EmbeddingClassifier::with_store(self.embedding_provider(), config, store)?;

        let emitted = classifier.classify(&event, text).await;
        self.memory
            .save_vectors(LABELS_STORE, classifier.store())
            .await?;

        print_event(emitted?.as_ref())
    }

    pub async fn search(&self, event: Event, query: &str) -> anyhow::Result<()> {
        let config = self
            .config
            .semantic_search
            .clone()
            .context("the config has no [semantic_search] table")?;

        let store = self.memory.load_vectors(DOCUMENTS_STORE, config.cache).await?;
        let mut search = SemanticSearch::with_store(self.embedding_provider(), config, store)?;

        let emitted = search.search(&event, query).await;
        self.memory
            .save_vectors(DOCUMENTS_STORE, search.store())
            .await?;

        print_event(emitted?.as_ref())
    }

    pub async fn submit(&self, event: Event, prompt: &str) -> anyhow::Result<()> {
        let agent = self.completion_agent().await?;

        let operation_id = agent.receive(&event, prompt).await?;

        let mut events = self.memory.load_events().await?;
        events.insert(event.id.clone(), event);
        self.memory.save_events(&events).await?;
        self.memory.save_pending(agent.pending()).await?;

        println!("{operation_id}");
        Ok(())
    }

    pub async fn check(&self, watch: Option<u64>) -> anyhow::Result<()> {
        let Some(seconds) = watch else {
            return self.check_once().await;
        };

        let mut interval = tokio::time::interval(Duration::from_secs(seconds.max(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => self.check_once().await?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                    return Ok(());
                }
            }
        }
    }

    /// One tick: load pending operations and events, poll, save both.
    async fn check_once(&self) -> anyhow::Result<()> {
        let agent = self.completion_agent().await?;
        let mut events = self.memory.load_events().await?;

        for event in agent.check(&events).await {
            print_event(Some(&event))?;
        }

        prune_events(&mut events, agent.pending()).await;
        self.memory.save_pending(agent.pending()).await?;
        self.memory.save_events(&events).await?;
        Ok(())
    }

    async fn completion_agent(&self) -> anyhow::Result<CompletionAgent<YandexGptClient>> {
        let config = self
            .config
            .completion
            .clone()
            .context("the config has no [completion] table")?;

        let client = self.completion_client(&config.model_name, &config.model_version);
        let pending = self.memory.load_pending().await?;
        let tracker = OperationTracker::with_pending(client, pending);
        Ok(CompletionAgent::with_tracker(tracker, config)?)
    }
}

/// Forget events no pending operation refers to any more.
async fn prune_events(events: &mut EventLog, pending: &PendingOperations) {
    let referenced: HashSet<String> = pending
        .snapshot()
        .await
        .into_iter()
        .map(|operation| operation.context_id)
        .collect();
    events.retain(|id, _| referenced.contains(id));
}

fn print_event(event: Option<&Event>) -> anyhow::Result<()> {
    if let Some(event) = event {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
