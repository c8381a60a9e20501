//! Negotiation agent runtime - turn orchestration over an external model
//!
//! This crate is the "brain" of the haggle system - the engine that:
//! - Interprets each user message (numeric offer + classified intent)
//! - Applies the deterministic accept/reject/continue policy
//! - Delegates reply generation and intent classification to a language
//!   service behind a narrow trait
//! - Finalizes terminal states (discount code, rejection, attempt budget)
//!
//! # Architecture
//!
//! One turn runs a constrained loop:
//! 1. **Offer extraction** (`haggle-core::price`) - lexical price scan
//! 2. **Intent classification** (`language`) - external, drift-tolerant
//! 3. **Policy** (`engine`) - tolerance, floor, attempt budget
//! 4. **Reply generation** (`language`) - the negotiator's next utterance
//!
//! # Safety Principle
//!
//! The model is strictly a text supplier. It NEVER decides acceptance,
//! prices, or session state. Those are deterministic decisions made by the
//! engine against the configured policy; generated prices below the floor
//! are clamped, not trusted.

pub mod engine;
pub mod language;
pub mod ollama;
pub mod persona;

pub use engine::{NegotiationEngine, TurnOutcome, DEAL_SENTINEL, NO_DEAL_SENTINEL};
pub use language::{Intent, LanguageService, LanguageServiceError};
pub use ollama::OllamaLanguageService;
