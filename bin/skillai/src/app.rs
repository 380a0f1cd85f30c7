use skillai_agent::{
    AlphaVantageClient, EvolutionEngine, ExperienceTracker, PartnerAuthor, PartnerChat, QuoteSource,
};
use skillai_core::{Config, Paths};
use skillai_directory::{NotionClient, PartnerDirectory, PartnerSource};
use skillai_providers::{create_provider, Provider, RetryPolicy};
use skillai_storage::{FileKvStore, KvStore, SessionFlags};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Local state every command needs: config, storage, XP and the partner list.
pub struct App {
    pub config: Config,
    pub paths: Paths,
    pub flags: Arc<SessionFlags>,
    pub tracker: Arc<ExperienceTracker>,
    pub directory: RwLock<PartnerDirectory>,
}

impl App {
    pub fn open() -> anyhow::Result<Self> {
        let paths = Paths::new();
        let config = Config::load_or_default(&paths)?;
        let store: Arc<dyn KvStore> = Arc::new(FileKvStore::open(paths.local_storage_file()));
        let source: Arc<dyn PartnerSource> = Arc::new(NotionClient::new(config.notion.clone()));
        Ok(Self::assemble(config, paths, store, source))
    }

    pub fn assemble(
        config: Config,
        paths: Paths,
        store: Arc<dyn KvStore>,
        source: Arc<dyn PartnerSource>,
    ) -> Self {
        let tracker = Arc::new(ExperienceTracker::new(store.clone(), &config.evolution));
        Self {
            flags: Arc::new(SessionFlags::new()),
            tracker,
            directory: RwLock::new(PartnerDirectory::new(source, store)),
            config,
            paths,
        }
    }

    /// Open and load the partner list.
    pub async fn start() -> anyhow::Result<Self> {
        let app = Self::open()?;
        app.directory.write().await.load().await;
        Ok(app)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.retry)
    }
}

/// Everything that talks to the model.
pub struct Ai {
    pub chat: PartnerChat,
    pub engine: EvolutionEngine,
    pub author: PartnerAuthor,
}

impl Ai {
    pub fn from_config(app: &App) -> anyhow::Result<Self> {
        let provider = create_provider(&app.config)?;
        Ok(Self::with_provider(app, provider))
    }

    pub fn with_provider(app: &App, provider: Arc<dyn Provider>) -> Self {
        let quotes: Arc<dyn QuoteSource> = Arc::new(AlphaVantageClient::new(
            app.config.market_data_key().map(str::to_string),
        ));
        let retry = app.retry_policy();
        Self {
            chat: PartnerChat::new(provider.clone(), app.tracker.clone(), retry).with_quotes(quotes),
            engine: EvolutionEngine::new(
                provider.clone(),
                app.tracker.clone(),
                app.flags.clone(),
                retry,
            ),
            author: PartnerAuthor::new(provider, retry),
        }
    }
}
