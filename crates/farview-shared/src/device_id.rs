//! Device identity: SHA-256 certificate fingerprints and their string form.
//!
//! A device ID is the SHA-256 digest of the DER-encoded certificate body.
//! The string form is base32 (no padding) of those 32 bytes, split into four
//! groups of thirteen characters, each group followed by one check character
//! computed with a Luhn-style mod-32 sum. Display adds a hyphen every seven
//! characters; parsing strips hyphens.

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DeviceIdError;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Chars of base32 output for 32 bytes, before check characters.
const DATA_LEN: usize = 52;
/// Data chars plus one check character per 13-char group.
const CHECKED_LEN: usize = 56;
const GROUP_LEN: usize = 13;

/// A 32-byte device identifier derived from a TLS certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId([u8; 32]);

impl DeviceId {
    pub fn from_raw(bytes: [u8; 32]) -> Self {
        DeviceId(bytes)
    }

    /// Fingerprint of a DER-encoded certificate body.
    pub fn from_der(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        let mut id = [0u8; 32];
        id.copy_from_slice(&digest);
        DeviceId(id)
    }

    /// Fingerprint of the first CERTIFICATE block in a PEM document.
    pub fn from_pem(pem: &[u8]) -> Result<Self, DeviceIdError> {
        let mut reader = &pem[..];
        let cert = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or(DeviceIdError::NoCertificate)?
            .map_err(|e| DeviceIdError::Pem(e.to_string()))?;
        Ok(Self::from_der(&cert))
    }

    /// Parse the check-digit string form. Hyphens are stripped first.
    pub fn parse(s: &str) -> Result<Self, DeviceIdError> {
        let stripped: String = s.chars().filter(|&c| c != '-').collect();
        if stripped.len() != CHECKED_LEN {
            return Err(DeviceIdError::InvalidLength(stripped.len()));
        }
        let chars = stripped.as_bytes();
        let mut data = Vec::with_capacity(DATA_LEN);
        for group in chars.chunks(GROUP_LEN + 1) {
            let check = luhn32(&group[..GROUP_LEN])?;
            if group[GROUP_LEN] != check {
                return Err(DeviceIdError::CheckDigitMismatch);
            }
            data.extend_from_slice(&group[..GROUP_LEN]);
        }
        let decoded = BASE32_NOPAD
            .decode(&data)
            .map_err(|_| DeviceIdError::InvalidCharacter)?;
        let mut id = [0u8; 32];
        id.copy_from_slice(&decoded);
        Ok(DeviceId(id))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The 56-character form: base32 data with one check character per group.
    pub fn to_checked_string(&self) -> String {
        let data = BASE32_NOPAD.encode(&self.0);
        debug_assert_eq!(data.len(), DATA_LEN);
        let mut out = String::with_capacity(CHECKED_LEN);
        for group in data.as_bytes().chunks(GROUP_LEN) {
            out.push_str(std::str::from_utf8(group).unwrap_or_default());
            // data chars come from our own encoder, luhn32 cannot fail here
            if let Ok(check) = luhn32(group) {
                out.push(check as char);
            }
        }
        out
    }

    pub fn short(&self) -> String {
        self.to_checked_string()[..7].to_string()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let checked = self.to_checked_string();
        let groups: Vec<&str> = checked
            .as_bytes()
            .chunks(7)
            .map(|c| std::str::from_utf8(c).unwrap_or_default())
            .collect();
        write!(f, "{}", groups.join("-"))
    }
}

impl std::fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = DeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check character over a group: weights alternate 1,2; each term is
/// `(w*v)/32 + (w*v)%32`; the check value is `(32 - sum%32) % 32`.
fn luhn32(group: &[u8]) -> Result<u8, DeviceIdError> {
    let mut factor = 1u32;
    let mut sum = 0u32;
    for &c in group {
        let v = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or(DeviceIdError::InvalidCharacter)? as u32;
        let addend = factor * v;
        factor = if factor == 2 { 1 } else { 2 };
        sum += addend / 32 + addend % 32;
    }
    let check = (32 - sum % 32) % 32;
    Ok(ALPHABET[check as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id() -> DeviceId {
        let mut raw = [0u8; 32];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        DeviceId::from_raw(raw)
    }

    #[test]
    fn string_roundtrip() {
        let id = sample_id();
        let s = id.to_checked_string();
        assert_eq!(s.len(), 56);
        let parsed = DeviceId::parse(&s).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn hyphenated_roundtrip() {
        let id = sample_id();
        let display = id.to_string();
        assert_eq!(display.len(), 63);
        assert_eq!(display.matches('-').count(), 7);
        let parsed: DeviceId = display.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn check_chars_at_group_ends() {
        let id = sample_id();
        let s = id.to_checked_string();
        let chars = s.as_bytes();
        for g in 0..4 {
            let start = g * 14;
            let expected = luhn32(&chars[start..start + 13]).unwrap();
            assert_eq!(chars[start + 13], expected, "group {g}");
        }
    }

    #[test]
    fn flipped_data_char_fails() {
        let id = sample_id();
        let mut s = id.to_checked_string().into_bytes();
        // Flip the first data character to a different alphabet member.
        s[0] = if s[0] == b'A' { b'B' } else { b'A' };
        let s = String::from_utf8(s).unwrap();
        assert!(matches!(
            DeviceId::parse(&s),
            Err(DeviceIdError::CheckDigitMismatch)
        ));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(matches!(
            DeviceId::parse("ABCDEFG"),
            Err(DeviceIdError::InvalidLength(7))
        ));
    }

    #[test]
    fn invalid_character_rejected() {
        let id = sample_id();
        let mut s = id.to_checked_string().into_bytes();
        s[5] = b'1'; // not in the base32 alphabet
        let s = String::from_utf8(s).unwrap();
        assert!(matches!(
            DeviceId::parse(&s),
            Err(DeviceIdError::InvalidCharacter)
        ));
    }

    #[test]
    fn der_fingerprint_is_sha256() {
        let der = b"not a real certificate, but any bytes digest the same way";
        let id = DeviceId::from_der(der);
        let digest = Sha256::digest(der);
        assert_eq!(id.as_bytes()[..], digest[..]);
    }

    #[test]
    fn pem_roundtrip() {
        let der = vec![0x30u8, 0x03, 0x02, 0x01, 0x01];
        let b64 = data_encoding::BASE64.encode(&der);
        let pem = format!("-----BEGIN CERTIFICATE-----\n{b64}\n-----END CERTIFICATE-----\n");
        let id = DeviceId::from_pem(pem.as_bytes()).unwrap();
        assert_eq!(id, DeviceId::from_der(&der));
    }
}
