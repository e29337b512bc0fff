//! Opaque pagination cursor codec
//!
//! A cursor encodes the rank key of the last-served item: the page index,
//! the display score, and the item id (tie-breaker). The payload carries a
//! keyed SHA-256 tag so clients cannot forge arbitrary offsets. Tokens that
//! fail to decode or verify are treated as absent, never as an error:
//! pagination fails closed by restarting from page 1.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Bytes of the keyed hash kept as the integrity tag
const TAG_LEN: usize = 16;

/// Decoded pagination continuation point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    /// 1-indexed page number that produced this cursor
    pub page: u32,
    /// Display score of the last item served
    pub last_score: f64,
    /// Id of the last item served (ascending tie-break)
    pub last_id: Uuid,
}

impl Cursor {
    /// Encode as an opaque URL-safe token
    pub fn encode(&self, secret: &str) -> String {
        // Score travels as raw bits so decode reproduces it exactly;
        // formatted floats would break rank-key comparisons
        let payload = format!(
            "{}:{:016x}:{}",
            self.page,
            self.last_score.to_bits(),
            self.last_id
        );
        let tag = sign(secret, &payload);
        URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, tag))
    }

    /// Decode and verify a token.
    ///
    /// Returns `None` for anything that is not a well-formed, correctly
    /// signed cursor (garbage, truncation, tampered payload, wrong secret).
    pub fn decode(token: &str, secret: &str) -> Option<Cursor> {
        let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
        let text = String::from_utf8(raw).ok()?;

        let (payload, tag) = text.rsplit_once('|')?;
        if sign(secret, payload) != tag {
            return None;
        }

        let mut parts = payload.splitn(3, ':');
        let page: u32 = parts.next()?.parse().ok()?;
        let score_bits = u64::from_str_radix(parts.next()?, 16).ok()?;
        let last_id = Uuid::parse_str(parts.next()?).ok()?;

        if page == 0 {
            return None;
        }

        Some(Cursor {
            page,
            last_score: f64::from_bits(score_bits),
            last_id,
        })
    }
}

fn sign(secret: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"\x00");
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    digest[..TAG_LEN].iter().map(|b| format!("{:02x}", b)).collect()
}
