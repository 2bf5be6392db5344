//! Secret byte buffers that zeroize on drop.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// An opaque credential (today a 4-digit PIN, but never assumed to be ASCII).
///
/// The bytes are wiped when the value is dropped and never appear in `Debug`
/// output.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct Secret {
    bytes: Vec<u8>,
}

/// Secret handed back by a successful biometric unlock.
pub type RecoveredSecret = Secret;

impl Secret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Self {
        Self {
            bytes: slice.to_vec(),
        }
    }

    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Secret {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Secret {
    fn from(slice: &[u8]) -> Self {
        Self::from_slice(slice)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual secret material
        f.debug_struct("Secret")
            .field("bytes", &"[REDACTED]")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secret = Secret::from_slice(b"1234");
        let printed = format!("{:?}", secret);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("1234"));
    }
}
