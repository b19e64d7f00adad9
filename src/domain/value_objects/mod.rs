//! Value Objects for the shop

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') { return Err(SkuError::InvalidCharacter); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
    #[error("SKU may only contain letters, digits, '-' and '_'")]
    InvalidCharacter,
}

/// URL slug derived from a display name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    /// Lowercases, folds common Latin accents to ASCII and collapses every
    /// run of other characters into a single `-`.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.chars().flat_map(char::to_lowercase) {
            let folded = fold_accent(c);
            if folded.is_empty() {
                pending_dash = !out.is_empty();
                continue;
            }
            if pending_dash { out.push('-'); pending_dash = false; }
            out.push_str(&folded);
        }
        if out.is_empty() { return Err(SlugError::Empty); }
        if out.len() > 120 { return Err(SlugError::TooLong); }
        Ok(Self(out))
    }

    /// Accepts an explicit slug, normalising it the same way as a name.
    pub fn parse(value: &str) -> Result<Self, SlugError> { Self::from_name(value) }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

fn fold_accent(c: char) -> String {
    let folded = match c {
        'a'..='z' | '0'..='9' => return c.to_string(),
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => "a",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'œ' => "oe",
        'æ' => "ae",
        'ß' => "ss",
        _ => "",
    };
    folded.to_string()
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("slug would be empty")]
    Empty,
    #[error("slug too long")]
    TooLong,
}

/// Money value object, in minor units (cents) of a single currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount_cents: i64, currency: String }

impl Money {
    pub fn new(amount_cents: i64, currency: &str) -> Self { Self { amount_cents, currency: currency.to_lowercase() } }
    pub fn eur(amount_cents: i64) -> Self { Self::new(amount_cents, "eur") }
    pub fn zero(currency: &str) -> Self { Self::new(0, currency) }
    pub fn amount_cents(&self) -> i64 { self.amount_cents }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount_cents == 0 }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        let amount = self.amount_cents.checked_add(other.amount_cents).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Result<Money, MoneyError> {
        let amount = self.amount_cents.checked_mul(i64::from(qty)).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }

    /// French-style display: `1 234,50 €`.
    pub fn display_fr(&self) -> String {
        let negative = self.amount_cents < 0;
        let abs = self.amount_cents.unsigned_abs();
        let units = (abs / 100).to_string();
        let mut grouped = String::new();
        for (i, c) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 { grouped.push('\u{202f}'); }
            grouped.push(c);
        }
        let symbol = match self.currency.as_str() {
            "eur" => "€",
            "usd" => "$",
            "gbp" => "£",
            other => other,
        };
        format!("{}{},{:02}\u{a0}{}", if negative { "-" } else { "" }, grouped, abs % 100, symbol)
    }
}

impl Default for Money { fn default() -> Self { Self::zero("eur") } }

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
    #[error("Amount overflow")]
    Overflow,
}
