use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use haggle_agent::{NegotiationEngine, OllamaLanguageService, TurnOutcome};
use haggle_core::config::{AppConfig, LoadOptions};
use haggle_core::SessionId;

use super::CommandResult;

/// Terminal negotiation client: drives the engine directly against the
/// configured language service, no HTTP layer involved.
pub fn run() -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult {
                exit_code: 1,
                output: format!("could not build chat runtime: {error}"),
            }
        }
    };

    match runtime.block_on(chat_loop()) {
        Ok(()) => CommandResult { exit_code: 0, output: String::new() },
        Err(error) => CommandResult { exit_code: 1, output: format!("chat failed: {error}") },
    }
}

async fn chat_loop() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    let language = Arc::new(OllamaLanguageService::from_config(&config.llm)?);
    let engine = NegotiationEngine::new(language, config.negotiation.clone());
    let mut session = engine.new_session(SessionId::mint())?;

    println!(
        "Negotiating over an item listed at {} {}. Type 'Deal!' to accept, 'No Deal!' to walk away.",
        config.negotiation.actual_price, config.negotiation.currency
    );

    let stdin = io::stdin();
    let mut initialized = false;

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let outcome = if initialized {
            engine.submit_message(&mut session, message).await?
        } else {
            initialized = true;
            engine.initialize(&mut session, message).await?
        };

        print_outcome(&outcome, &config.negotiation.currency);
        if session.is_closed() {
            break;
        }
    }

    Ok(())
}

fn print_outcome(outcome: &TurnOutcome, currency: &str) {
    println!("{}", outcome.reply);
    if let Some(price) = outcome.last_negotiated_price {
        println!("  [on the table: {price} {currency}]");
    }
}
