//! Validated identity-token claims.

use serde_json::{Map, Value};

/// Claims of a successfully validated identity token.
///
/// Instances exist only after signature and claim validation passed; the
/// constructor is crate-private so unvalidated claims can never leak to
/// callers. Accessors return `None` for absent or wrong-typed values
/// instead of panicking, so consumers can be written against a stable
/// contract regardless of provider quirks.
#[derive(Debug, Clone)]
pub struct DecodedClaims {
    claims: Map<String, Value>,
}

impl DecodedClaims {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Raw claim value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// String claim.
    pub fn str_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// Numeric claim as whole seconds. Accepts both integer and float
    /// encodings; some providers serialize NumericDate values
    /// fractionally.
    pub fn numeric_claim(&self, name: &str) -> Option<i64> {
        let value = self.claims.get(name)?;
        value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
    }

    /// List-of-strings claim; non-string entries are skipped.
    pub fn string_list_claim(&self, name: &str) -> Option<Vec<String>> {
        let entries = self.claims.get(name)?.as_array()?;
        Some(
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Nested object claim.
    pub fn object_claim(&self, name: &str) -> Option<&Map<String, Value>> {
        self.claims.get(name)?.as_object()
    }

    /// `sub`.
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// `iss`.
    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    /// `preferred_username`.
    pub fn preferred_username(&self) -> Option<&str> {
        self.str_claim("preferred_username")
    }

    /// `email`.
    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    /// `exp` as Unix seconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.numeric_claim("exp")
    }
}
