//! Wiring configuration, storage, and the model backend together.

use super::commands::Cli;
use fabula_error::{ConfigError, ConfigErrorKind, FabulaResult};
use fabula_interface::{SessionId, SessionRepository};
use fabula_storage::{FileSessionRepository, InMemorySessionRepository};
use fabula_story::{SessionState, StorageBackend, StoryConfig};
use std::sync::Arc;
use tracing::info;

/// Load configuration and apply command-line overrides.
pub fn load_config(cli: &Cli) -> FabulaResult<StoryConfig> {
    let config = match &cli.config {
        Some(path) => StoryConfig::from_file(path)?,
        None => StoryConfig::load()?,
    };
    let config = match &cli.chain {
        Some(chain) => {
            let session = config.session().clone().with_active_chain(chain.clone());
            config.with_session(session)
        }
        None => config,
    };
    let config = if cli.memory {
        let storage = config.storage().clone().with_backend(StorageBackend::Memory);
        config.with_storage(storage)
    } else {
        config
    };
    Ok(config)
}

/// Repository selected by the storage settings.
pub fn repository(config: &StoryConfig) -> FabulaResult<Arc<dyn SessionRepository>> {
    let storage = config.storage();
    let repository: Arc<dyn SessionRepository> = match storage.backend() {
        StorageBackend::File => {
            info!(path = %storage.path().display(), "Using file storage");
            Arc::new(FileSessionRepository::new(storage.path())?)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; sessions end with the process");
            Arc::new(InMemorySessionRepository::new())
        }
    };
    Ok(repository)
}

/// Start or resume a session and run it interactively.
#[cfg(feature = "anthropic")]
pub async fn play(config: &StoryConfig, resume: Option<SessionId>) -> FabulaResult<()> {
    use fabula_models::AnthropicClient;
    use fabula_story::StoryService;

    let model = config.model();
    if model.provider() != "anthropic" {
        return Err(ConfigError::new(ConfigErrorKind::Unsupported(format!(
            "model provider '{}'; this build supports 'anthropic'",
            model.provider()
        )))
        .into());
    }
    let driver =
        AnthropicClient::from_env(model.name().clone())?.with_max_tokens(*model.max_tokens());
    let service = StoryService::new(Arc::new(driver), repository(config)?, config)?;

    let id = match resume {
        Some(id) => service.resume_session(id).await?,
        None => service.start_session().await,
    };
    super::play::run_session(&service, id).await
}

/// Start or resume a session and run it interactively.
#[cfg(not(feature = "anthropic"))]
pub async fn play(_config: &StoryConfig, _resume: Option<SessionId>) -> FabulaResult<()> {
    Err(ConfigError::new(ConfigErrorKind::Unsupported(
        "no model backend compiled in; rebuild with the `anthropic` feature".to_string(),
    ))
    .into())
}

/// Print a stored session.
pub async fn show(config: &StoryConfig, id: SessionId) -> FabulaResult<()> {
    let snapshot = repository(config)?.load_session(&id).await?.ok_or_else(|| {
        fabula_error::StoryError::new(fabula_error::StoryErrorKind::SessionNotFound(
            id.to_string(),
        ))
    })?;
    let state = SessionState::from_snapshot(snapshot)?;

    println!("Session {}", state.id());
    for chapter in state.chapters() {
        println!(
            "\n--- Chapter {} ({}) ---\nFeature: {}\n\n{}",
            chapter.index(),
            chapter.dimension(),
            chapter.user_input(),
            chapter.story()
        );
    }
    if let Some(summary) = state.summary() {
        println!(
            "\nEnded {} with {:.2}% coverage after {} prompts",
            summary.ended_at().format("%Y-%m-%d %H:%M"),
            summary.coverage_percentage(),
            summary.num_prompts()
        );
    }
    if let Some(ranking) = state.ranking() {
        println!("\nRanking:");
        for (n, feature) in ranking.ordered_features().iter().enumerate() {
            println!("  {}. {}", n + 1, feature);
        }
    }
    Ok(())
}

/// Print the configured dimensions and chains.
pub fn describe(config: &StoryConfig) -> FabulaResult<()> {
    let dimensions = config.dimension_set()?;
    let registry = config.registry()?;

    println!("Dimensions ({}):", dimensions.len());
    for dimension in dimensions.iter() {
        println!("  {:<16} {}", dimension.id(), dimension.name());
    }

    println!("\nRole chains:");
    for name in registry.names() {
        let chain = registry.get(name)?;
        let active = if name == config.session().active_chain() {
            " (active)"
        } else {
            ""
        };
        let roles: Vec<String> = chain
            .roles()
            .iter()
            .map(|r| format!("{} [{}, {}]", r.name(), r.tag(), r.scope()))
            .collect();
        println!("  {}{}: {}", name, active, roles.join(" -> "));
    }
    Ok(())
}
