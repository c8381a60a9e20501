use std::sync::Arc;

use haggle_agent::{LanguageServiceError, NegotiationEngine, OllamaLanguageService};
use haggle_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::info;

use crate::sessions::SessionStore;

pub struct Application {
    pub config: AppConfig,
    pub engine: Arc<NegotiationEngine>,
    pub sessions: SessionStore,
    pub language: Arc<OllamaLanguageService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("language service client failed to build: {0}")]
    LanguageClient(#[source] LanguageServiceError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let language = Arc::new(
        OllamaLanguageService::from_config(&config.llm).map_err(BootstrapError::LanguageClient)?,
    );
    let engine =
        Arc::new(NegotiationEngine::new(language.clone(), config.negotiation.clone()));

    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        "negotiation engine constructed"
    );

    Ok(Application { config, engine, sessions: SessionStore::new(), language })
}

#[cfg(test)]
mod tests {
    use haggle_core::config::{ConfigOverrides, LoadOptions};
    use rust_decimal::Decimal;

    use super::{bootstrap, BootstrapError};

    #[test]
    fn bootstrap_succeeds_with_default_policy() {
        let app = bootstrap(LoadOptions {
            config_path: None,
            require_file: false,
            overrides: ConfigOverrides::default(),
        })
        .expect("bootstrap succeeds");

        assert!(app.sessions.is_empty());
        assert_eq!(app.engine.policy().currency, app.config.negotiation.currency);
    }

    #[test]
    fn bootstrap_fails_fast_on_inconsistent_policy() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                actual_price: Some(Decimal::from(1000)),
                min_price: Some(Decimal::from(2000)),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let error = result.err().expect("bootstrap must fail on inverted bounds");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("min_price"));
    }
}
