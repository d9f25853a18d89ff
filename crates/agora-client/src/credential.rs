//! Bearer credential injection.
//!
//! The session never reads tokens from storage. Callers hand it a
//! [`CredentialSource`] that resolves the currently issued token, which the
//! session reads once per activation.

use std::fmt;

/// An already-issued bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token. Blank tokens are treated as absent.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() { None } else { Some(Self(token)) }
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Value of an `Authorization` header carrying this token.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Resolves the current credential synchronously.
pub trait CredentialSource: Send + Sync {
    /// The credential to use now, or `None` if the user is not signed in.
    fn credential(&self) -> Option<Credential>;
}

impl CredentialSource for Credential {
    fn credential(&self) -> Option<Credential> {
        Some(self.clone())
    }
}

impl CredentialSource for Option<Credential> {
    fn credential(&self) -> Option<Credential> {
        self.clone()
    }
}

impl<T: CredentialSource + ?Sized> CredentialSource for std::sync::Arc<T> {
    fn credential(&self) -> Option<Credential> {
        (**self).credential()
    }
}

/// Adapts a closure into a [`CredentialSource`].
pub struct CredentialFn<F>(pub F);

impl<F> CredentialSource for CredentialFn<F>
where
    F: Fn() -> Option<Credential> + Send + Sync,
{
    fn credential(&self) -> Option<Credential> {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_absent() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("  ").is_none());
        assert_eq!(Credential::new("abc").map(|c| c.bearer()), Some("Bearer abc".to_string()));
    }

    #[test]
    fn debug_hides_token() {
        let credential = Credential::new("secret-token").unwrap();
        assert!(!format!("{credential:?}").contains("secret"));
    }

    #[test]
    fn closure_source_is_read_each_time() {
        let source = CredentialFn(|| Credential::new("fresh"));
        assert_eq!(source.credential().unwrap().token(), "fresh");
    }
}
