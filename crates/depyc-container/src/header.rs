//! En-tête fixe du conteneur : étiquette magique (4 octets) + horodatage (u32 LE).

use std::{
    fmt,
    str::FromStr,
    time::{Duration, SystemTime, SystemTimeError, UNIX_EPOCH},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Taille de l’en-tête : magic (4) + timestamp (4).
pub const HEADER_LEN: usize = 8;

/// Identifiant de la version de sérialisation du code embarqué.
///
/// Affiché et parsé comme 8 chiffres hexadécimaux (`1d0c0d0a`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MagicTag(pub [u8; 4]);

impl MagicTag {
    /// Étiquette du format de référence livré avec `depyc-core`.
    pub const CURRENT: Self = Self::from_version(depyc_core::MAGIC_NUMBER);

    /// `version` en u16 little-endian suivi de `\r\n`.
    pub const fn from_version(version: u16) -> Self {
        let v = version.to_le_bytes();
        Self([v[0], v[1], b'\r', b'\n'])
    }

    /// Numéro de version si l’étiquette suit la convention `u16 + \r\n`.
    pub const fn version(self) -> Option<u16> {
        match self.0 {
            [lo, hi, b'\r', b'\n'] => Some(u16::from_le_bytes([lo, hi])),
            _ => None,
        }
    }

    /// Octets bruts.
    pub const fn as_bytes(&self) -> &[u8; 4] { &self.0 }
}

impl Default for MagicTag {
    fn default() -> Self { Self::CURRENT }
}

impl fmt::Display for MagicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Erreur de parsing d’une étiquette magique textuelle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid magic tag `{0}`: expected 8 hex digits")]
pub struct ParseMagicError(pub String);

impl FromStr for MagicTag {
    type Err = ParseMagicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")).unwrap_or(hex);
        if hex.len() != 8 || !hex.is_ascii() {
            return Err(ParseMagicError(s.to_string()));
        }
        let mut out = [0u8; 4];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| ParseMagicError(s.to_string()))?;
        }
        Ok(Self(out))
    }
}

/// Secondes depuis l’epoch, tronquées à 32 bits (little-endian sur le fil).
///
/// Purement informatif : aucune validation au-delà de la plage u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timestamp(pub u32);

impl Timestamp {
    /// Secondes entières depuis l’epoch, masquées sur les 32 bits de poids faible.
    ///
    /// Échoue pour un instant antérieur à l’epoch.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_system_time(t: SystemTime) -> Result<Self, SystemTimeError> {
        let secs = t.duration_since(UNIX_EPOCH)?.as_secs();
        Ok(Self((secs & 0xFFFF_FFFF) as u32))
    }

    /// Instant correspondant (dans la fenêtre 1970-2106).
    pub fn to_system_time(self) -> SystemTime { UNIX_EPOCH + Duration::from_secs(u64::from(self.0)) }

    /// Valeur brute.
    pub const fn as_secs(self) -> u32 { self.0 }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// En-tête décodé, sans toucher à la charge utile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    /// Étiquette lue (égale à la référence du codec).
    pub magic: MagicTag,
    /// Horodatage lu.
    pub timestamp: Timestamp,
    /// Nombre d’octets après l’en-tête.
    pub payload_len: usize,
}

/* ───────────────────────────── Tests ───────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_version_is_le_plus_crlf() {
        let tag = MagicTag::from_version(3413);
        assert_eq!(tag.0, [0x55, 0x0D, 0x0D, 0x0A]);
        assert_eq!(tag.version(), Some(3413));
        assert_eq!(MagicTag(*b"abcd").version(), None);
    }

    #[test]
    fn current_tracks_core_format() {
        assert_eq!(MagicTag::CURRENT.version(), Some(depyc_core::MAGIC_NUMBER));
    }

    #[test]
    fn hex_display_and_parse() {
        let tag = MagicTag([0xb9, 0x0b, 0x0d, 0x0a]);
        assert_eq!(tag.to_string(), "b90b0d0a");
        assert_eq!("b90b0d0a".parse::<MagicTag>(), Ok(tag));
        assert_eq!("0xB90B0D0A".parse::<MagicTag>(), Ok(tag));
        assert!("b90b0d".parse::<MagicTag>().is_err());
        assert!("zz0b0d0a".parse::<MagicTag>().is_err());
        assert!("é0b0d0a".parse::<MagicTag>().is_err());
    }

    #[test]
    fn timestamp_masks_to_low_32_bits() {
        let t = UNIX_EPOCH + Duration::from_secs((1u64 << 32) + 7);
        assert_eq!(Timestamp::from_system_time(t).unwrap(), Timestamp(7));

        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
        assert_eq!(Timestamp::from_system_time(t).unwrap(), Timestamp(1_700_000_000));
        assert_eq!(Timestamp(1_700_000_000).to_system_time(), UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    }

    #[test]
    fn pre_epoch_is_an_error() {
        let t = UNIX_EPOCH - Duration::from_secs(1);
        assert!(Timestamp::from_system_time(t).is_err());
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_roundtrip() {
        let h = Header { magic: MagicTag::CURRENT, timestamp: Timestamp(1_700_000_000), payload_len: 42 };
        let json = serde_json::to_string(&h).unwrap();
        let back: Header = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn newtypes_serialize_transparently() {
        assert_eq!(serde_json::to_string(&Timestamp(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&MagicTag([1, 2, 3, 4])).unwrap(), "[1,2,3,4]");
    }
}
