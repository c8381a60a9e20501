use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Mints a fresh transport-layer identifier. The engine itself never
    /// creates network-visible identity.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Negotiating,
    Accepted,
    Rejected,
    AttemptsExhausted,
    Closed,
}

impl SessionState {
    /// Terminal states refuse further offers; only `history` may still grow
    /// for audit purposes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::AttemptsExhausted | Self::Closed)
    }
}

/// One end-to-end negotiation conversation and its state. Owned by a single
/// engine instance; per-session serialization is the transport layer's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationSession {
    pub id: SessionId,
    pub state: SessionState,
    pub attempts: u32,
    pub actual_price: Decimal,
    pub min_price: Decimal,
    pub last_negotiated_price: Option<Decimal>,
    pub currency: String,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl NegotiationSession {
    pub fn new(
        id: SessionId,
        actual_price: Decimal,
        min_price: Decimal,
        currency: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if actual_price < Decimal::ZERO || min_price < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(
                "session prices must be non-negative".to_string(),
            ));
        }
        if min_price > actual_price {
            return Err(DomainError::InvariantViolation(format!(
                "min_price {min_price} exceeds actual_price {actual_price}"
            )));
        }

        Ok(Self {
            id,
            state: SessionState::Initializing,
            attempts: 0,
            actual_price,
            min_price,
            last_negotiated_price: None,
            currency: currency.into(),
            history: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// The price the negotiator currently stands behind: the last price
    /// either party put on the table, or the list price before any offer.
    pub fn anchor_price(&self) -> Decimal {
        self.last_negotiated_price.unwrap_or(self.actual_price)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self.state, next),
            (SessionState::Initializing, SessionState::Negotiating)
                | (SessionState::Negotiating, SessionState::Accepted)
                | (SessionState::Negotiating, SessionState::Rejected)
                | (SessionState::Negotiating, SessionState::AttemptsExhausted)
                | (SessionState::Negotiating, SessionState::Closed)
        )
    }

    pub fn transition_to(&mut self, next: SessionState) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.state = next;
            return Ok(());
        }

        Err(DomainError::InvalidSessionTransition { from: self.state, to: next })
    }

    pub fn push_turn(&mut self, role: Role, text: impl Into<String>) {
        self.history.push(Turn::new(role, text));
    }

    /// Records a newly negotiated price. Once set, the price is only ever
    /// replaced, never cleared, until the next `reset`.
    pub fn record_price(&mut self, price: Decimal) {
        self.last_negotiated_price = Some(price);
    }

    /// Returns the session to a fresh pre-negotiation state, dropping
    /// history, attempts, and any negotiated price.
    pub fn reset(&mut self) {
        self.state = SessionState::Initializing;
        self.attempts = 0;
        self.last_negotiated_price = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{NegotiationSession, Role, SessionId, SessionState};
    use crate::errors::DomainError;

    fn session_fixture() -> NegotiationSession {
        NegotiationSession::new(
            SessionId("s-test-1".to_string()),
            Decimal::new(150_000, 2),
            Decimal::new(120_000, 2),
            "GBP",
        )
        .expect("fixture session is valid")
    }

    #[test]
    fn rejects_inverted_price_bounds() {
        let result = NegotiationSession::new(
            SessionId("s-test-2".to_string()),
            Decimal::new(100_000, 2),
            Decimal::new(120_000, 2),
            "GBP",
        );
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn negotiating_reaches_each_terminal_state() {
        for terminal in [
            SessionState::Accepted,
            SessionState::Rejected,
            SessionState::AttemptsExhausted,
            SessionState::Closed,
        ] {
            let mut session = session_fixture();
            session.transition_to(SessionState::Negotiating).expect("init -> negotiating");
            session.transition_to(terminal).expect("negotiating -> terminal");
            assert!(session.is_closed());
        }
    }

    #[test]
    fn terminal_states_refuse_further_transitions() {
        let mut session = session_fixture();
        session.transition_to(SessionState::Negotiating).expect("init -> negotiating");
        session.transition_to(SessionState::Accepted).expect("negotiating -> accepted");

        let result = session.transition_to(SessionState::Negotiating);
        assert_eq!(
            result,
            Err(DomainError::InvalidSessionTransition {
                from: SessionState::Accepted,
                to: SessionState::Negotiating,
            })
        );
    }

    #[test]
    fn anchor_price_falls_back_to_list_price() {
        let mut session = session_fixture();
        assert_eq!(session.anchor_price(), Decimal::new(150_000, 2));

        session.record_price(Decimal::new(140_000, 2));
        assert_eq!(session.anchor_price(), Decimal::new(140_000, 2));
    }

    #[test]
    fn reset_clears_negotiation_progress() {
        let mut session = session_fixture();
        session.transition_to(SessionState::Negotiating).expect("init -> negotiating");
        session.push_turn(Role::User, "how about £1300?");
        session.record_price(Decimal::new(130_000, 2));
        session.attempts = 3;

        session.reset();

        assert_eq!(session.state, SessionState::Initializing);
        assert_eq!(session.attempts, 0);
        assert!(session.history.is_empty());
        assert!(session.last_negotiated_price.is_none());
    }
}
