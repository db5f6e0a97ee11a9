//! Collision-free record id generation.

use rand_core::{OsRng, RngCore as _};

use crate::{Error, Result, store::ProfileStore};

/// Probe budget before giving up on finding an unused id.
pub const MAX_ID_ATTEMPTS: usize = 100;

/// 128 random bits, hex encoded.
pub fn random_token() -> String {
  let mut bytes = [0u8; 16];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Draw ids until one is not in use by any stored record.
pub async fn generate_id<S: ProfileStore>(store: &S) -> Result<String> {
  generate_id_with(store, random_token).await
}

/// [`generate_id`] with a caller-supplied token source.
pub async fn generate_id_with<S, F>(store: &S, mut next_token: F) -> Result<String>
where
  S: ProfileStore,
  F: FnMut() -> String,
{
  for _ in 0..MAX_ID_ATTEMPTS {
    let candidate = next_token();
    if !store.id_exists(&candidate).await.map_err(Error::store)? {
      return Ok(candidate);
    }
    tracing::debug!(id = %candidate, "record id already in use, drawing again");
  }

  Err(Error::IdExhausted { attempts: MAX_ID_ATTEMPTS })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokens_are_32_hex_chars() {
    let token = random_token();
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn tokens_differ() {
    assert_ne!(random_token(), random_token());
  }
}
