//! Per-peer shared secrets
//!
//! Generated lazily on first request and kept for the life of the process.
//! Nothing is persisted; a restart hands out fresh keys.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

const KEY_LEN: usize = 32;

#[derive(Debug, Default)]
pub struct SecretKeyCache {
    keys: Mutex<HashMap<String, String>>,
}

impl SecretKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base64 secret for `identifier`, generating one if none exists yet
    pub fn get_or_create(&self, identifier: &str) -> String {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.entry(identifier.to_string())
            .or_insert_with(generate_key)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn generate_key() -> String {
    let bytes: [u8; KEY_LEN] = rand::random();
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_key_is_stable_per_identifier() {
        let cache = SecretKeyCache::new();
        let a1 = cache.get_or_create("alice@example.com/-lan-1");
        let a2 = cache.get_or_create("alice@example.com/-lan-1");
        let b = cache.get_or_create("carol@example.com/-lan-3");

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(cache.len(), 2);
        assert_eq!(STANDARD.decode(&a1).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_concurrent_first_use_agrees() {
        let cache = Arc::new(SecretKeyCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_create("alice@example.com/-lan-1"))
            })
            .collect();
        let keys: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len(), 1);
    }
}
