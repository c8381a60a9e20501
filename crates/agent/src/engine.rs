use std::sync::Arc;

use haggle_core::config::NegotiationConfig;
use haggle_core::domain::session::{NegotiationSession, Role, SessionId, SessionState};
use haggle_core::errors::DomainError;
use haggle_core::price::{ExtractionMode, PriceExtractor};
use haggle_core::{discount, policy};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::language::{Intent, LanguageService};
use crate::persona;

/// Sentinel messages from the deal/no-deal affordance. They bypass
/// classification entirely.
pub const DEAL_SENTINEL: &str = "Deal!";
pub const NO_DEAL_SENTINEL: &str = "No Deal!";

/// The visible result of one engine turn, in the shape the transport layer
/// serializes back to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub last_negotiated_price: Option<Decimal>,
    pub show_buttons: bool,
    pub state: SessionState,
}

impl TurnOutcome {
    fn of(session: &NegotiationSession, reply: impl Into<String>, show_buttons: bool) -> Self {
        Self {
            reply: reply.into(),
            last_negotiated_price: session.last_negotiated_price,
            show_buttons,
            state: session.state,
        }
    }
}

/// Orchestrates a single negotiation turn: extracts offers, consults the
/// language service, applies the deterministic accept/reject/continue
/// policy, and finalizes terminal states. All policy decisions are made
/// here; the language service only supplies text and intent labels.
pub struct NegotiationEngine {
    language: Arc<dyn LanguageService>,
    policy: NegotiationConfig,
    extractor: PriceExtractor,
}

impl NegotiationEngine {
    pub fn new(language: Arc<dyn LanguageService>, policy: NegotiationConfig) -> Self {
        let extractor = PriceExtractor::new(&policy.currency);
        Self { language, policy, extractor }
    }

    pub fn policy(&self) -> &NegotiationConfig {
        &self.policy
    }

    pub fn new_session(&self, id: SessionId) -> Result<NegotiationSession, DomainError> {
        NegotiationSession::new(
            id,
            self.policy.actual_price,
            self.policy.min_price,
            self.policy.currency.clone(),
        )
    }

    /// Resets the session, seeds the opening discounted counter-offer and
    /// the persona system turn, then feeds the caller's opening message
    /// through `submit_message`.
    pub async fn initialize(
        &self,
        session: &mut NegotiationSession,
        opening_message: &str,
    ) -> Result<TurnOutcome, DomainError> {
        session.reset();

        let opening = discount::opening_offer(
            self.policy.actual_price,
            self.policy.opening_discount_min_pct,
            self.policy.opening_discount_max_pct,
            &mut rand::thread_rng(),
        );
        session.record_price(opening);
        session.push_turn(Role::System, persona::system_turn_text(&self.policy, opening));
        session.transition_to(SessionState::Negotiating)?;

        info!(
            event_name = "negotiation.session.initialized",
            session_id = %session.id,
            opening_price = %opening,
            "session initialized with opening counter-offer"
        );

        self.submit_message(session, opening_message).await
    }

    /// The core decision procedure for one user message. Turn mutations are
    /// staged on a draft and committed only when the turn completes, so a
    /// failed language-service call leaves the session exactly as it was.
    pub async fn submit_message(
        &self,
        session: &mut NegotiationSession,
        user_message: &str,
    ) -> Result<TurnOutcome, DomainError> {
        if session.is_closed() {
            return Ok(TurnOutcome::of(
                session,
                "This negotiation has already ended. Thank you for your time!",
                false,
            ));
        }

        let mut draft = session.clone();
        if draft.state == SessionState::Initializing {
            draft.transition_to(SessionState::Negotiating)?;
        }

        let trimmed = user_message.trim();
        if trimmed == DEAL_SENTINEL {
            let outcome = self.finalize_acceptance(&mut draft)?;
            *session = draft;
            return Ok(outcome);
        }
        if trimmed == NO_DEAL_SENTINEL {
            let outcome = self.finalize_rejection(&mut draft)?;
            *session = draft;
            return Ok(outcome);
        }

        draft.push_turn(Role::User, user_message);

        let user_offer = self.extractor.extract(user_message, ExtractionMode::LowestOf);
        let user_intent = match self.language.classify_intent(user_message, Role::User, &draft).await
        {
            Ok(intent) => intent,
            Err(error) => {
                warn!(
                    event_name = "negotiation.classify.degraded",
                    session_id = %draft.id,
                    error = %error,
                    "intent classification failed; continuing as unknown"
                );
                Intent::Unknown
            }
        };

        // Explicit rejection outweighs any numeric coincidence.
        if user_intent == Intent::Rejection {
            let outcome = self.finalize_rejection(&mut draft)?;
            *session = draft;
            return Ok(outcome);
        }

        let offer_within_tolerance = user_offer
            .map(|offer| {
                policy::within_tolerance(offer, draft.anchor_price(), self.policy.tolerance)
                    && policy::meets_floor(offer, self.policy.min_price)
            })
            .unwrap_or(false);

        if user_intent == Intent::Acceptance || offer_within_tolerance {
            if offer_within_tolerance {
                if let Some(offer) = user_offer {
                    draft.record_price(offer);
                }
            }
            let outcome = self.finalize_acceptance(&mut draft)?;
            *session = draft;
            return Ok(outcome);
        }

        if draft.attempts >= self.policy.max_attempts {
            let outcome = self.finalize_exhausted(&mut draft)?;
            *session = draft;
            return Ok(outcome);
        }

        let reply = match self.language.generate_reply(&draft.history).await {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    event_name = "negotiation.generate.failed",
                    session_id = %session.id,
                    error = %error,
                    "reply generation failed; turn rolled back"
                );
                return Ok(self.degraded_outcome(session));
            }
        };

        if let Some(bot_offer) = self.extractor.extract(&reply, ExtractionMode::LastOf) {
            draft.record_price(policy::clamp_to_floor(bot_offer, self.policy.min_price));
        }
        draft.push_turn(Role::Assistant, &reply);

        let assistant_intent =
            match self.language.classify_intent(&reply, Role::Assistant, &draft).await {
                Ok(intent) => intent,
                Err(error) => {
                    warn!(
                        event_name = "negotiation.classify.degraded",
                        session_id = %draft.id,
                        error = %error,
                        "assistant intent classification failed; continuing as unknown"
                    );
                    Intent::Unknown
                }
            };

        if assistant_intent == Intent::Acceptance {
            let outcome = self.finalize_acceptance(&mut draft)?;
            *session = draft;
            return Ok(outcome);
        }

        draft.attempts += 1;
        info!(
            event_name = "negotiation.turn.countered",
            session_id = %draft.id,
            attempts = draft.attempts,
            last_negotiated_price = %draft.anchor_price(),
            "negotiator issued a counter-offer"
        );

        let outcome = TurnOutcome::of(&draft, reply, false);
        *session = draft;
        Ok(outcome)
    }

    fn finalize_acceptance(
        &self,
        draft: &mut NegotiationSession,
    ) -> Result<TurnOutcome, DomainError> {
        let price = draft.anchor_price();
        let code = discount::generate_code(&mut rand::thread_rng());
        let reply = format!(
            "Deal closed! We've accepted your offer of {price} {currency}. Here's your \
             discount code: {code}. Thank you for negotiating with us!",
            currency = draft.currency,
        );

        draft.record_price(price);
        draft.push_turn(Role::Assistant, &reply);
        draft.transition_to(SessionState::Accepted)?;

        info!(
            event_name = "negotiation.session.accepted",
            session_id = %draft.id,
            price = %price,
            "negotiation finalized with a discount code"
        );

        Ok(TurnOutcome::of(draft, reply, false))
    }

    fn finalize_rejection(
        &self,
        draft: &mut NegotiationSession,
    ) -> Result<TurnOutcome, DomainError> {
        let reply = "Sorry that we couldn't reach an agreement. Better luck next time!";
        draft.push_turn(Role::Assistant, reply);
        draft.transition_to(SessionState::Rejected)?;

        info!(
            event_name = "negotiation.session.rejected",
            session_id = %draft.id,
            "negotiation closed without agreement"
        );

        Ok(TurnOutcome::of(draft, reply, false))
    }

    fn finalize_exhausted(
        &self,
        draft: &mut NegotiationSession,
    ) -> Result<TurnOutcome, DomainError> {
        let price = draft.anchor_price();
        let reply = format!(
            "We've reached the maximum negotiation attempts. Our final price is {price} \
             {currency}.",
            currency = draft.currency,
        );

        draft.push_turn(Role::Assistant, &reply);
        draft.transition_to(SessionState::AttemptsExhausted)?;

        info!(
            event_name = "negotiation.session.exhausted",
            session_id = %draft.id,
            final_price = %price,
            attempts = draft.attempts,
            "attempt budget exhausted; final price stands"
        );

        Ok(TurnOutcome::of(draft, reply, true))
    }

    fn degraded_outcome(&self, session: &NegotiationSession) -> TurnOutcome {
        TurnOutcome::of(session, "Sorry, something went wrong!", false)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use haggle_core::config::NegotiationConfig;
    use haggle_core::domain::session::{NegotiationSession, Role, SessionId, SessionState};
    use haggle_core::Turn;
    use rust_decimal::Decimal;

    use super::{NegotiationEngine, DEAL_SENTINEL, NO_DEAL_SENTINEL};
    use crate::language::{Intent, LanguageService, LanguageServiceError};

    /// Deterministic stand-in for the external model: pops scripted
    /// classifications and replies, with sensible defaults when the script
    /// runs dry.
    #[derive(Default)]
    struct ScriptedLanguageService {
        intents: Mutex<VecDeque<Result<Intent, LanguageServiceError>>>,
        replies: Mutex<VecDeque<Result<String, LanguageServiceError>>>,
    }

    impl ScriptedLanguageService {
        fn with_intents(mut self, intents: Vec<Result<Intent, LanguageServiceError>>) -> Self {
            self.intents = Mutex::new(intents.into());
            self
        }

        fn with_replies(mut self, replies: Vec<Result<String, LanguageServiceError>>) -> Self {
            self.replies = Mutex::new(replies.into());
            self
        }
    }

    #[async_trait]
    impl LanguageService for ScriptedLanguageService {
        async fn classify_intent(
            &self,
            _message: &str,
            _role: Role,
            _session: &NegotiationSession,
        ) -> Result<Intent, LanguageServiceError> {
            self.intents
                .lock()
                .expect("intents lock")
                .pop_front()
                .unwrap_or(Ok(Intent::Negotiation))
        }

        async fn generate_reply(&self, _history: &[Turn]) -> Result<String, LanguageServiceError> {
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Ok("Our counter-offer stands at £1450.".to_string()))
        }
    }

    fn policy_fixture() -> NegotiationConfig {
        NegotiationConfig {
            actual_price: Decimal::from(1500),
            min_price: Decimal::from(1200),
            currency: "GBP".to_string(),
            max_attempts: 5,
            tolerance: Decimal::new(2, 2),
            opening_discount_min_pct: Decimal::from(2),
            opening_discount_max_pct: Decimal::from(5),
        }
    }

    fn engine_with(service: ScriptedLanguageService) -> NegotiationEngine {
        NegotiationEngine::new(Arc::new(service), policy_fixture())
    }

    /// A session mid-negotiation with a known anchor price, without going
    /// through `initialize` (which would consume scripted replies).
    fn negotiating_session(engine: &NegotiationEngine, anchor: Decimal) -> NegotiationSession {
        let mut session = engine
            .new_session(SessionId("s-engine-test".to_string()))
            .expect("session fixture is valid");
        session.transition_to(SessionState::Negotiating).expect("init -> negotiating");
        session.record_price(anchor);
        session
    }

    fn extract_code(reply: &str) -> &str {
        let marker = "discount code: ";
        let start = reply.find(marker).expect("finalize message carries a code") + marker.len();
        &reply[start..start + 6]
    }

    #[tokio::test]
    async fn deal_sentinel_finalizes_with_discount_code() {
        let engine = engine_with(ScriptedLanguageService::default());
        let mut session = negotiating_session(&engine, Decimal::from(1470));

        let outcome =
            engine.submit_message(&mut session, DEAL_SENTINEL).await.expect("turn succeeds");

        assert_eq!(outcome.state, SessionState::Accepted);
        assert!(!outcome.show_buttons);
        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1470)));
        assert!(session.is_closed());

        let code = extract_code(&outcome.reply);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn no_deal_sentinel_rejects() {
        let engine = engine_with(ScriptedLanguageService::default());
        let mut session = negotiating_session(&engine, Decimal::from(1470));

        let outcome =
            engine.submit_message(&mut session, NO_DEAL_SENTINEL).await.expect("turn succeeds");

        assert_eq!(outcome.state, SessionState::Rejected);
        assert!(!outcome.show_buttons);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn closed_session_turns_are_idempotent() {
        let engine = engine_with(ScriptedLanguageService::default());
        let mut session = negotiating_session(&engine, Decimal::from(1470));
        engine.submit_message(&mut session, DEAL_SENTINEL).await.expect("finalize");

        let history_len = session.history.len();
        let first = engine.submit_message(&mut session, "hello?").await.expect("no-op");
        let second = engine.submit_message(&mut session, "£100").await.expect("no-op");

        assert_eq!(first, second);
        assert_eq!(session.attempts, 0);
        assert_eq!(session.history.len(), history_len);
        assert!(first.reply.contains("already ended"));
    }

    #[tokio::test]
    async fn offer_within_tolerance_finalizes_at_user_price() {
        let engine = engine_with(ScriptedLanguageService::default());
        let mut session = negotiating_session(&engine, Decimal::from(1500));

        let outcome =
            engine.submit_message(&mut session, "I can stretch to £1530").await.expect("turn");

        assert_eq!(outcome.state, SessionState::Accepted);
        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1530)));
        assert!(!outcome.show_buttons);
    }

    #[tokio::test]
    async fn offer_just_outside_tolerance_keeps_negotiating() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_replies(vec![Ok("Closer, but I need £1480.".to_string())]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1500));

        let outcome =
            engine.submit_message(&mut session, "final answer: £1530.15").await.expect("turn");

        assert_eq!(outcome.state, SessionState::Negotiating);
        assert_eq!(session.attempts, 1);
        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1480)));
    }

    #[tokio::test]
    async fn rejection_intent_overrides_tolerance() {
        let engine = engine_with(
            ScriptedLanguageService::default().with_intents(vec![Ok(Intent::Rejection)]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1500));

        let outcome = engine
            .submit_message(&mut session, "£1530 is my limit and that's a no from me")
            .await
            .expect("turn");

        assert_eq!(outcome.state, SessionState::Rejected);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn tolerance_acceptance_respects_the_floor() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_replies(vec![Ok("I can't go that low.".to_string())]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1210));

        // Within 2% of the anchor but below the 1200 floor.
        let outcome = engine.submit_message(&mut session, "£1195").await.expect("turn");

        assert_eq!(outcome.state, SessionState::Negotiating);
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn acceptance_intent_finalizes_at_anchor_price() {
        let engine = engine_with(
            ScriptedLanguageService::default().with_intents(vec![Ok(Intent::Acceptance)]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1440));

        let outcome =
            engine.submit_message(&mut session, "alright, you've got a deal").await.expect("turn");

        assert_eq!(outcome.state, SessionState::Accepted);
        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1440)));
    }

    #[tokio::test]
    async fn exhausted_attempts_freeze_the_price() {
        let engine = engine_with(ScriptedLanguageService::default());
        let mut session = negotiating_session(&engine, Decimal::from(1450));
        session.attempts = 5;

        let outcome = engine.submit_message(&mut session, "can you do £1300?").await.expect("turn");

        assert_eq!(outcome.state, SessionState::AttemptsExhausted);
        assert!(outcome.show_buttons);
        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1450)));
        assert!(outcome.reply.contains("final price is 1450 GBP"));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn counter_offer_updates_price_and_attempts() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_replies(vec![Ok("How about £1400 or even £1390?".to_string())]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1470));

        let outcome = engine.submit_message(&mut session, "too steep for me").await.expect("turn");

        // Generation-assisted extraction keeps the most recent number.
        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1390)));
        assert_eq!(session.attempts, 1);
        assert_eq!(outcome.state, SessionState::Negotiating);
        let last = session.history.last().expect("assistant turn recorded");
        assert_eq!(last.role, Role::Assistant);
    }

    #[tokio::test]
    async fn assistant_acceptance_finalizes_the_turn() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_intents(vec![Ok(Intent::Negotiation), Ok(Intent::Acceptance)])
                .with_replies(vec![Ok("Fine, £1400 it is.".to_string())]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1470));

        let outcome = engine.submit_message(&mut session, "I'll give you £1400").await.expect("turn");

        assert_eq!(outcome.state, SessionState::Accepted);
        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1400)));
        assert_eq!(session.attempts, 0);
    }

    #[tokio::test]
    async fn generated_offer_below_floor_is_clamped() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_replies(vec![Ok("Let's just say £900 and be done.".to_string())]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1470));

        let outcome = engine.submit_message(&mut session, "go lower").await.expect("turn");

        assert_eq!(outcome.last_negotiated_price, Some(Decimal::from(1200)));
    }

    #[tokio::test]
    async fn generation_failure_rolls_the_turn_back() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_replies(vec![Err(LanguageServiceError::Timeout { timeout_secs: 30 })]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1470));
        let before = session.clone();

        let outcome = engine.submit_message(&mut session, "still thinking").await.expect("turn");

        assert_eq!(outcome.reply, "Sorry, something went wrong!");
        assert!(!outcome.show_buttons);
        assert_eq!(session, before, "failed turn must not mutate the session");
    }

    #[tokio::test]
    async fn classification_failure_degrades_to_unknown() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_intents(vec![Err(LanguageServiceError::Transport("boom".to_string()))])
                .with_replies(vec![Ok("Still at £1450.".to_string())]),
        );
        let mut session = negotiating_session(&engine, Decimal::from(1470));

        let outcome = engine.submit_message(&mut session, "hmm").await.expect("turn");

        assert_eq!(outcome.state, SessionState::Negotiating);
        assert_eq!(session.attempts, 1);
    }

    #[tokio::test]
    async fn initialize_seeds_opening_offer_and_system_turn() {
        let engine = engine_with(
            ScriptedLanguageService::default()
                .with_replies(vec![Ok("Welcome! Let's talk.".to_string())]),
        );
        let mut session = engine
            .new_session(SessionId("s-init".to_string()))
            .expect("session fixture is valid");

        let outcome = engine.initialize(&mut session, "Hi there").await.expect("initialize");

        assert_eq!(session.state, SessionState::Negotiating);
        let opening = outcome.last_negotiated_price.expect("opening offer seeded");
        assert!(opening >= Decimal::new(142_500, 2) && opening <= Decimal::new(147_000, 2));

        assert_eq!(session.history[0].role, Role::System);
        assert_eq!(session.history[1].role, Role::User);
        assert_eq!(session.history.last().expect("assistant reply").role, Role::Assistant);
        assert_eq!(session.attempts, 1);
    }

    #[tokio::test]
    async fn attempts_never_exceed_the_budget() {
        let engine = engine_with(ScriptedLanguageService::default());
        let mut session = negotiating_session(&engine, Decimal::from(1470));

        let mut closing_outcome = None;
        for _ in 0..10 {
            let outcome = engine.submit_message(&mut session, "keep going").await.expect("turn");
            assert!(session.attempts <= 5);
            if session.is_closed() {
                closing_outcome = Some(outcome);
                break;
            }
        }

        let closing = closing_outcome.expect("budget exhaustion closes the session");
        assert_eq!(closing.state, SessionState::AttemptsExhausted);
        assert!(closing.show_buttons);
        assert_eq!(session.attempts, 5);

        // Further turns are terminal no-ops with the frozen price.
        let after = engine.submit_message(&mut session, "£1300?").await.expect("no-op");
        assert_eq!(after.last_negotiated_price, Some(Decimal::from(1450)));
        assert_eq!(session.attempts, 5);
    }
}
