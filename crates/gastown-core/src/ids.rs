//! Bead id helpers: prefix extraction, town-level detection, id minting.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// The reserved prefix for town-level beads.
pub const HQ_PREFIX: &str = "hq-";

/// Lowercase base32 alphabet (a-z, 2-7).
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Id sub-prefix constants for minted beads.
pub mod id_prefix {
    /// Ephemeral workflow instances (gt-wisp-xxx).
    pub const WISP: &str = "wisp";
    /// Tracking convoys (hq-cv-xxx).
    pub const CONVOY: &str = "cv";
}

/// Extracts the routing prefix of a bead id, hyphen included.
///
/// Returns the substring up to and including the first hyphen. The empty
/// string is returned for an empty id, an id with no hyphen, or an id
/// starting with a hyphen; any hyphen beyond the first belongs to the
/// suffix.
pub fn extract_prefix(id: &str) -> &str {
    match id.find('-') {
        Some(0) | None => "",
        Some(i) => &id[..=i],
    }
}

/// Returns `true` iff the id names a town-level bead.
pub fn is_town_level(id: &str) -> bool {
    id.starts_with(HQ_PREFIX)
}

/// Converts a byte slice to a lowercase base32 string of the given length.
///
/// Bits are consumed big-endian, five at a time; a trailing partial group
/// is zero-padded. Output shorter than `length` is padded with the zero
/// digit, longer output is truncated.
pub fn encode_base32(data: &[u8], length: usize) -> String {
    let mut chars: Vec<u8> = Vec::with_capacity(length);
    let mut buf: u32 = 0;
    let mut bits: u32 = 0;

    for &b in data {
        buf = (buf << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            chars.push(BASE32_ALPHABET[((buf >> bits) & 0x1f) as usize]);
        }
    }
    if bits > 0 {
        chars.push(BASE32_ALPHABET[((buf << (5 - bits)) & 0x1f) as usize]);
    }

    let mut s = String::from_utf8(chars).expect("base32 chars are valid UTF-8");
    while s.len() < length {
        s.push(BASE32_ALPHABET[0] as char);
    }
    s.truncate(length);
    s
}

/// Generates a fresh convoy id: `hq-cv-` plus the lowercase base32 of three
/// random bytes.
pub fn new_convoy_id() -> String {
    let bytes: [u8; 3] = rand::random();
    format!("{}{}-{}", HQ_PREFIX, id_prefix::CONVOY, encode_base32(&bytes, 5))
}

/// Creates a hash-based id for a minted bead.
///
/// `prefix` is given without its trailing hyphen. The hash covers title,
/// creator, timestamp and nonce, so retries with a bumped nonce produce a
/// different id.
pub fn mint_id(
    prefix: &str,
    title: &str,
    creator: &str,
    timestamp: DateTime<Utc>,
    nonce: i32,
) -> String {
    let content = format!(
        "{}|{}|{}|{}",
        title,
        creator,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        nonce
    );
    let hash = Sha256::digest(content.as_bytes());
    format!("{}-{}", prefix, encode_base32(&hash[..4], 6))
}

// ---------------------------------------------------------------------------
// Agent beads
// ---------------------------------------------------------------------------

/// Derivation of agent-bead ids from agent identities.
///
/// All agent beads are town-level (`hq-` prefixed) so a single store holds
/// the identity roster regardless of which rig an agent works in.
pub mod agent_bead {
    use super::HQ_PREFIX;

    /// The town coordinator's bead id.
    pub fn mayor() -> String {
        format!("{HQ_PREFIX}mayor")
    }

    /// The town health-checker's bead id.
    pub fn deacon() -> String {
        format!("{HQ_PREFIX}deacon")
    }

    /// A rig witness's bead id.
    pub fn witness(rig: &str) -> String {
        format!("{HQ_PREFIX}witness-{rig}")
    }

    /// A rig refinery's bead id.
    pub fn refinery(rig: &str) -> String {
        format!("{HQ_PREFIX}refinery-{rig}")
    }

    /// A polecat's bead id.
    pub fn polecat(rig: &str, name: &str) -> String {
        format!("{HQ_PREFIX}polecat-{rig}-{name}")
    }

    /// A crew member's bead id.
    pub fn crew(rig: &str, name: &str) -> String {
        format!("{HQ_PREFIX}crew-{rig}-{name}")
    }

    /// Derives the agent-bead id from an agent identity string.
    ///
    /// Accepted shapes: `mayor`, `deacon`, `<rig>/witness`,
    /// `<rig>/refinery`, `<rig>/polecats/<name>`, `<rig>/crew/<name>`.
    /// Returns `None` for anything else.
    pub fn for_identity(identity: &str) -> Option<String> {
        let segments: Vec<&str> = identity.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["mayor"] => Some(mayor()),
            ["deacon"] => Some(deacon()),
            [rig, "witness"] => Some(witness(rig)),
            [rig, "refinery"] => Some(refinery(rig)),
            [rig, "polecats" | "polecat", name] => Some(polecat(rig, name)),
            [rig, "crew", name] => Some(crew(rig, name)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_prefix_basic() {
        assert_eq!(extract_prefix("gt-abc"), "gt-");
        assert_eq!(extract_prefix("hq-cv-abc"), "hq-");
        assert_eq!(extract_prefix("bd-1"), "bd-");
    }

    #[test]
    fn extract_prefix_degenerate() {
        assert_eq!(extract_prefix(""), "");
        assert_eq!(extract_prefix("abc"), "");
        assert_eq!(extract_prefix("-abc"), "");
    }

    #[test]
    fn town_level_detection() {
        assert!(is_town_level("hq-1"));
        assert!(is_town_level("hq-cv-abcde"));
        assert!(!is_town_level("gt-1"));
        assert!(!is_town_level(""));
    }

    #[test]
    fn encode_base32_length() {
        let result = encode_base32(&[0xFF, 0xFF, 0xFF], 5);
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn encode_base32_zero_pads() {
        // Empty input -> all zero digits.
        assert_eq!(encode_base32(&[], 4), "aaaa");
    }

    #[test]
    fn encode_base32_known_value() {
        // 0x00 0x00 0x00 -> 24 zero bits -> "aaaaa".
        assert_eq!(encode_base32(&[0, 0, 0], 5), "aaaaa");
        // 0xFF -> 11111 111(00) -> '7' then alphabet[0b11100].
        assert_eq!(encode_base32(&[0xFF], 2), "74");
    }

    #[test]
    fn convoy_id_shape() {
        let id = new_convoy_id();
        assert!(id.starts_with("hq-cv-"));
        assert_eq!(id.len(), "hq-cv-".len() + 5);
        assert!(is_town_level(&id));
    }

    #[test]
    fn mint_id_deterministic() {
        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let id1 = mint_id("gt", "Title", "mayor", ts, 0);
        let id2 = mint_id("gt", "Title", "mayor", ts, 0);
        assert_eq!(id1, id2);
        assert!(id1.starts_with("gt-"));
    }

    #[test]
    fn mint_id_nonce_changes_output() {
        let ts = Utc::now();
        let id1 = mint_id("gt", "Title", "mayor", ts, 0);
        let id2 = mint_id("gt", "Title", "mayor", ts, 1);
        assert_ne!(id1, id2);
    }

    #[test]
    fn agent_bead_ids() {
        assert_eq!(agent_bead::mayor(), "hq-mayor");
        assert_eq!(agent_bead::witness("gastown"), "hq-witness-gastown");
        assert_eq!(agent_bead::polecat("gastown", "nux"), "hq-polecat-gastown-nux");
    }

    #[test]
    fn agent_bead_for_identity() {
        assert_eq!(agent_bead::for_identity("mayor"), Some("hq-mayor".into()));
        assert_eq!(
            agent_bead::for_identity("gastown/polecats/nux"),
            Some("hq-polecat-gastown-nux".into())
        );
        assert_eq!(
            agent_bead::for_identity("gastown/crew/max"),
            Some("hq-crew-gastown-max".into())
        );
        assert_eq!(
            agent_bead::for_identity("gastown/refinery"),
            Some("hq-refinery-gastown".into())
        );
        assert_eq!(agent_bead::for_identity("warboy"), None);
        assert_eq!(agent_bead::for_identity(""), None);
    }
}
