//! Session identifiers and correlation tokens.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Public identifier of a session.
///
/// The value comes from an [`IdGenerator`] and may be anything the caller
/// chooses, so it is never used to tag protocol lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be used as a plain file name.
    pub fn is_file_name(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && !self.0.contains(['/', '\\', '\0'])
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of public session ids.
pub trait IdGenerator: Send + Sync {
    /// Produce a new id. Ids must not collide between live sessions.
    fn generate(&self) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// Default generator: random UUID v4 in simple (hyphen-less) form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Shared handle to an id generator.
pub type SharedIdGenerator = Arc<dyn IdGenerator>;

/// High-entropy token tagging the completion protocol's lines.
///
/// Always generated internally; distinct from the public [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Generate a fresh token.
    pub fn generate() -> Self {
        Self(format!("sb{}", Uuid::new_v4().simple()))
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the token as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_uniqueness() {
        let generator = UuidGenerator;
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = generator.generate();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {}", id);
        }
    }

    #[test]
    fn test_uuid_format() {
        let id = UuidGenerator.generate();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_closure_generator() {
        let generator = || "fixed".to_string();
        assert_eq!(generator.generate(), "fixed");

        let shared: SharedIdGenerator = Arc::new(|| "shared".to_string());
        assert_eq!(shared.generate(), "shared");
    }

    #[test]
    fn test_token_uniqueness() {
        let a = CorrelationToken::generate();
        let b = CorrelationToken::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("sb"));
        assert_eq!(a.as_bytes().len(), 34);
    }

    #[test]
    fn test_file_name_check() {
        assert!(SessionId::new("abc123").is_file_name());
        assert!(!SessionId::new("").is_file_name());
        assert!(!SessionId::new("..").is_file_name());
        assert!(!SessionId::new("a/b").is_file_name());
    }

    #[test]
    fn test_display() {
        let id = SessionId::new("sess-1");
        assert_eq!(id.to_string(), "sess-1");
        assert_eq!(id.as_str(), "sess-1");
    }
}
