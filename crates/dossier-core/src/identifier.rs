//! Classification of caller-supplied profile identifiers.

use serde::{Deserialize, Serialize};

/// What a caller-supplied identifier denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
  Email,
  Domain,
  /// An internal record id.
  Opaque,
}

/// Classify an identifier.
///
/// `@` wins over `.`: `jo@example.com` is an email even though it also
/// contains a dot. Anything with neither is treated as a record id.
pub fn classify(identifier: &str) -> IdentifierKind {
  if identifier.contains('@') {
    IdentifierKind::Email
  } else if identifier.contains('.') {
    IdentifierKind::Domain
  } else {
    IdentifierKind::Opaque
  }
}

/// The domain part of an email address: whatever follows the first `@`, up
/// to any further `@`. Returns `None` when that part is empty or missing.
pub fn derive_domain(email: &str) -> Option<&str> {
  email.split('@').nth(1).filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn at_sign_means_email() {
    assert_eq!(classify("jo@example.com"), IdentifierKind::Email);
    assert_eq!(classify("jo@localhost"), IdentifierKind::Email);
  }

  #[test]
  fn dot_without_at_means_domain() {
    assert_eq!(classify("example.com"), IdentifierKind::Domain);
    assert_eq!(classify("a.b.c"), IdentifierKind::Domain);
  }

  #[test]
  fn everything_else_is_opaque() {
    assert_eq!(
      classify("7493d768db0549ea8b593368db237349"),
      IdentifierKind::Opaque
    );
    assert_eq!(classify("x"), IdentifierKind::Opaque);
  }

  #[test]
  fn derive_domain_takes_part_after_at() {
    assert_eq!(derive_domain("jo@example.com"), Some("example.com"));
    assert_eq!(derive_domain("a@b@c"), Some("b"));
    assert_eq!(derive_domain("jo@"), None);
    assert_eq!(derive_domain("example.com"), None);
  }
}
