//! Lexical price extraction from free-form negotiation text.
//!
//! This is a best-effort token scan, not semantic understanding: an amount
//! counts as a price when it sits next to a currency marker (leading symbol
//! or trailing code), with a permissive fallback to bare numbers when no
//! marked amount is present. False positives and negatives are accepted.

use rust_decimal::Decimal;

const KNOWN_SYMBOLS: [char; 3] = ['£', '$', '€'];
const KNOWN_CODES: [&str; 3] = ["GBP", "USD", "EUR"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Lowest candidate wins. Used on raw user offers, where quoting several
    /// numbers reads as "I'd pay as little as ...".
    LowestOf,
    /// Most recently produced candidate wins. Used on generated replies,
    /// where the final number is the negotiator's standing offer.
    LastOf,
}

#[derive(Clone, Debug)]
pub struct PriceExtractor {
    code: String,
    permissive: bool,
}

struct Candidate {
    value: Decimal,
    marked: bool,
}

impl PriceExtractor {
    /// Extractor for the given currency code with the bare-number fallback
    /// enabled.
    pub fn new(currency: &str) -> Self {
        Self { code: currency.to_ascii_uppercase(), permissive: true }
    }

    /// Extractor that only accepts amounts adjacent to a currency marker.
    pub fn strict(currency: &str) -> Self {
        Self { code: currency.to_ascii_uppercase(), permissive: false }
    }

    /// Scans `text` for a monetary amount. Returns `None` when nothing
    /// parses; extraction never fails past this boundary.
    pub fn extract(&self, text: &str, mode: ExtractionMode) -> Option<Decimal> {
        let candidates = self.scan(text);

        let marked: Vec<Decimal> =
            candidates.iter().filter(|candidate| candidate.marked).map(|c| c.value).collect();
        let pool = if !marked.is_empty() {
            marked
        } else if self.permissive {
            candidates.iter().map(|candidate| candidate.value).collect()
        } else {
            Vec::new()
        };

        match mode {
            ExtractionMode::LowestOf => pool.into_iter().min(),
            ExtractionMode::LastOf => pool.into_iter().last(),
        }
    }

    fn scan(&self, text: &str) -> Vec<Candidate> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut candidates = Vec::new();
        let mut index = 0;

        while index < tokens.len() {
            let cleaned = trim_punctuation(tokens[index]);
            if cleaned.is_empty() {
                index += 1;
                continue;
            }

            // Leading symbol, amount attached ("£1450") or one token later
            // ("£ 1450").
            if let Some(rest) = strip_symbol(cleaned) {
                if rest.is_empty() {
                    if let Some(next) = tokens.get(index + 1) {
                        if let Some(value) = parse_amount(trim_punctuation(next)) {
                            candidates.push(Candidate { value, marked: true });
                            index += 2;
                            continue;
                        }
                    }
                } else if let Some(value) = parse_amount(rest) {
                    candidates.push(Candidate { value, marked: true });
                }
                index += 1;
                continue;
            }

            // Trailing code attached to the amount ("1450GBP").
            let (amount_part, suffix) = split_trailing_alpha(cleaned);
            if !suffix.is_empty() {
                if self.is_code(suffix) {
                    if let Some(value) = parse_amount(amount_part) {
                        candidates.push(Candidate { value, marked: true });
                    }
                }
                index += 1;
                continue;
            }

            if let Some(value) = parse_amount(cleaned) {
                let followed_by_code = tokens
                    .get(index + 1)
                    .map(|next| self.is_code(trim_punctuation(next)))
                    .unwrap_or(false);
                if followed_by_code {
                    candidates.push(Candidate { value, marked: true });
                    index += 2;
                } else {
                    candidates.push(Candidate { value, marked: false });
                    index += 1;
                }
                continue;
            }

            index += 1;
        }

        candidates
    }

    fn is_code(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(&self.code)
            || KNOWN_CODES.iter().any(|code| token.eq_ignore_ascii_case(code))
    }
}

fn strip_symbol(token: &str) -> Option<&str> {
    KNOWN_SYMBOLS.iter().find_map(|symbol| token.strip_prefix(*symbol))
}

fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| {
        matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '(' | ')' | '"' | '\'')
    })
}

fn split_trailing_alpha(token: &str) -> (&str, &str) {
    let suffix_len =
        token.chars().rev().take_while(|c| c.is_ascii_alphabetic()).count();
    token.split_at(token.len() - suffix_len)
}

/// Parses an unsigned monetary literal, tolerating thousands separators.
/// Anything containing other characters (dates, times, ranges) is rejected.
fn parse_amount(token: &str) -> Option<Decimal> {
    if token.is_empty() || !token.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if token.chars().any(|c| !c.is_ascii_digit() && c != '.' && c != ',') {
        return None;
    }

    token.replace(',', "").parse::<Decimal>().ok()
}
