use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Keys shorter than this are rejected before any network call.
pub const MIN_API_KEY_LEN: usize = 10;

/// Generation API key material supplied by the user.
///
/// The value is trimmed on construction and never shows up in `Debug` output;
/// use [`ApiKey::fingerprint`] when a key has to be identified in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// First 8 hex chars of the SHA-256 of the key.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(digest)[..8].to_string()
    }

    /// `AIzaS...x9Q2w` style preview for UIs that want to show a remembered key.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= MIN_API_KEY_LEN {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..5].iter().collect();
        let tail: String = chars[chars.len() - 5..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey({})", self.fingerprint())
    }
}
