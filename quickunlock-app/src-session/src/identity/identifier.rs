use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Maximum identifier length in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 128;

const PROFILE_PREFIX: &str = "profile:";
const TOKEN_PREFIX: &str = "token:";

/// Marks a profile id that was hashed because it is not keystore-safe.
const HASHED_PROFILE_TAG: &str = "h:";

/// Number of hex characters of a digest kept in the identifier.
const DIGEST_CHARS: usize = 32;

/// Why a raw string cannot be used as an identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Identifier exceeds {} bytes", MAX_IDENTIFIER_LEN)]
    TooLong,

    #[error("Identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Stable key that namespaces every vault and preference entry of one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserIdentifier(String);

impl UserIdentifier {
    /// Validate a raw identifier.
    ///
    /// Allowed characters are ASCII alphanumerics and `. _ : @ -`, which keeps
    /// identifiers safe as keystore account names and state-file keys.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '@' | '-')))
        {
            return Err(IdentifierError::InvalidCharacter(c));
        }
        Ok(Self(raw))
    }

    /// Identifier for a user id taken from profile data.
    ///
    /// Ids that are safe as-is become `profile:<id>`. Anything else (phone
    /// numbers with `+`, spaces, non-ASCII, overlong ids, ids that already
    /// start with `h:`) maps to `profile:h:<digest>`, so every non-empty id
    /// yields an identifier.
    pub fn from_profile(profile_id: &str) -> Result<Self, IdentifierError> {
        let trimmed = profile_id.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if !trimmed.starts_with(HASHED_PROFILE_TAG) {
            if let Ok(id) = Self::new(format!("{PROFILE_PREFIX}{trimmed}")) {
                return Ok(id);
            }
        }
        let digest = hex::encode(Sha256::digest(trimmed.as_bytes()));
        Ok(Self(format!(
            "{PROFILE_PREFIX}{HASHED_PROFILE_TAG}{}",
            &digest[..DIGEST_CHARS]
        )))
    }

    /// Deterministic identifier derived from a long-lived auth token.
    pub fn from_token_digest(digest: &TokenDigest) -> Self {
        Self(format!(
            "{TOKEN_PREFIX}{}",
            &digest.to_hex()[..DIGEST_CHARS]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserIdentifier> for String {
    fn from(id: UserIdentifier) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of a long-lived auth token. The token itself is never kept.
#[derive(Clone)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    pub fn of(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn from_hex(encoded: &str) -> Option<Self> {
        let bytes = hex::decode(encoded).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Constant-time equality.
    pub fn matches(&self, other: &TokenDigest) -> bool {
        use subtle::ConstantTimeEq;
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenDigest({}..)", &self.to_hex()[..8])
    }
}
