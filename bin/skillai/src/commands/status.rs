use skillai_core::{Config, Paths};
use skillai_providers::infer_provider_from_model;

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("skillai status");
    println!("==============");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (not found, using defaults)" }
    );
    let storage_path = paths.local_storage_file();
    println!(
        "Storage:   {} {}",
        storage_path.display(),
        mark(storage_path.exists())
    );

    let config = Config::load_or_default(&paths)?;

    println!("Model:     {}", config.agent.model);
    let active = config
        .agent
        .provider
        .as_deref()
        .or_else(|| infer_provider_from_model(&config.agent.model));
    if let Some(name) = active {
        println!("Provider:  {}", name);
    }
    println!();

    println!("Providers:");
    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();
    for name in names {
        let configured = config
            .get_provider(name)
            .map(|p| !p.api_key.is_empty())
            .unwrap_or(false);
        println!(
            "  {:<12} {}",
            name,
            if configured { "✓ configured" } else { "✗ no key" }
        );
    }

    println!();
    println!(
        "Evolution: +{} XP per message, evolve at {} XP",
        config.evolution.xp_per_message, config.evolution.xp_to_evolve
    );
    println!(
        "Retry:     {} attempts, {}ms initial delay, x{} backoff",
        config.retry.max_attempts, config.retry.initial_delay_ms, config.retry.backoff_multiplier
    );
    println!(
        "Quotes:    Alpha Vantage {}",
        if config.market_data_key().is_some() {
            "✓ shared key"
        } else {
            "✗ per-partner apiKey only"
        }
    );

    println!();
    println!("Notion:");
    let notion = &config.notion;
    println!("  api key    {}", mark(notion.is_enabled()));
    println!("  partners   {}", mark(notion.partners_database().is_some()));
    println!("  creations  {}", mark(notion.creation_database().is_some()));
    println!("  feedback   {}", mark(notion.feedback_database().is_some()));

    println!();
    let token_required = config
        .gateway
        .api_token
        .as_deref()
        .map_or(false, |t| !t.is_empty());
    println!(
        "Gateway:   {}:{}{}",
        config.gateway.host,
        config.gateway.port,
        if token_required { " (token required)" } else { "" }
    );

    if !config_exists {
        println!();
        println!("Run `skillai onboard` to initialize.");
    }

    Ok(())
}
