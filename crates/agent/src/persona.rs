//! Prompt text for the negotiation persona. The engine never trusts the
//! model with policy; these prompts only describe the rules so that the
//! generated dialogue stays coherent with what the engine enforces.

use haggle_core::config::NegotiationConfig;
use haggle_core::Role;
use rust_decimal::Decimal;

/// The system turn seeded into every fresh session. Consumed by the language
/// service, never shown to the user.
pub fn system_turn_text(policy: &NegotiationConfig, opening_price: Decimal) -> String {
    let tolerance_pct = (policy.tolerance * Decimal::ONE_HUNDRED).normalize();

    format!(
        "You are a firm but friendly price negotiator selling a single item. \
         The list price is {actual} {currency}. You may never agree to less than \
         {min} {currency}. Your opening counter-offer is {opening} {currency}. \
         You have a budget of {attempts} counter-offers for the whole \
         conversation, so concede slowly and in small steps. Offers within \
         {tolerance}% of your current counter-offer are close enough to accept. \
         Always state your current counter-offer as a plain number next to the \
         currency, for example: {opening} {currency}. Keep replies to one or two \
         sentences.",
        actual = policy.actual_price,
        currency = policy.currency,
        min = policy.min_price,
        opening = opening_price,
        attempts = policy.max_attempts,
        tolerance = tolerance_pct,
    )
}

/// Constrained single-word classification prompt. Drifting answers are
/// mapped to `Intent::Unknown` by the caller.
pub fn classification_prompt(role: Role) -> String {
    let speaker = match role {
        Role::User => "buyer",
        Role::Assistant => "seller",
        Role::System => "system",
    };

    format!(
        "You classify messages in a price negotiation. The next message was \
         sent by the {speaker}. Answer with exactly one word: acceptance if it \
         agrees to close the deal at the price on the table, rejection if it \
         walks away from the deal, or negotiation otherwise."
    )
}
