//! 规范位置 ID
//!
//! 规范 ID 是 26 位 Crockford Base32 字符串（不含 I/L/O/U），
//! 由固定的 48 位时间戳和 slug 的 SHA-256 前 80 位拼成 16 字节后编码。
//! 相同 slug 永远生成相同 ID。

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Crockford Base32 字母表
pub const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// 规范 ID 长度
pub const CANONICAL_LEN: usize = 26;

/// 确定性 ID 使用的固定时间戳（毫秒，2023-11-14T22:13:20Z）
const FIXED_EPOCH_MS: u64 = 1_700_000_000_000;

/// 是否为规范 ID（只接受大写）
pub fn is_canonical(s: &str) -> bool {
    s.len() == CANONICAL_LEN && s.bytes().all(|b| ALPHABET.contains(&b))
}

/// slug 规范化：去除首尾空白并转小写
pub fn normalize_slug(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// 由 slug 生成确定性的规范 ID
pub fn generate_canonical_id(slug: &str) -> LocationId {
    let slug = normalize_slug(slug);
    let digest = Sha256::digest(slug.as_bytes());

    let mut bytes = [0u8; 16];
    bytes[..6].copy_from_slice(&FIXED_EPOCH_MS.to_be_bytes()[2..]);
    bytes[6..].copy_from_slice(&digest[..10]);

    LocationId(encode_base32(u128::from_be_bytes(bytes)))
}

/// 128 位整数编码为 26 位 Base32（高位补零）
fn encode_base32(value: u128) -> String {
    (0..CANONICAL_LEN)
        .map(|i| {
            let shift = 5 * (CANONICAL_LEN - 1 - i);
            ALPHABET[((value >> shift) & 0x1f) as usize] as char
        })
        .collect()
}

/// 已校验的规范位置 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(String);

impl LocationId {
    /// 只接受已经是规范形式的输入，不查别名
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        is_canonical(raw).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LocationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for LocationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LocationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        LocationId::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("not a canonical location id: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_canonical_and_stable() {
        let a = generate_canonical_id("my-cafe");
        let b = generate_canonical_id("my-cafe");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), CANONICAL_LEN);
        assert!(is_canonical(a.as_str()));
    }

    #[test]
    fn test_generated_id_normalizes_slug() {
        assert_eq!(
            generate_canonical_id("  My-Cafe "),
            generate_canonical_id("my-cafe")
        );
        assert_ne!(
            generate_canonical_id("my-cafe"),
            generate_canonical_id("my-bar")
        );
    }

    #[test]
    fn test_shared_timestamp_prefix() {
        // 固定时间戳占前 48 位，不同 slug 的前 9 位字符相同
        let a = generate_canonical_id("alpha");
        let b = generate_canonical_id("beta");
        assert_eq!(&a.as_str()[..9], &b.as_str()[..9]);
    }

    #[test]
    fn test_is_canonical() {
        assert!(is_canonical("01HF7YAT00ABCDEFGHJKMNPQRS"));
        // 小写不算规范形式
        assert!(!is_canonical("01hf7yat00abcdefghjkmnpqrs"));
        // 排除 I L O U
        assert!(!is_canonical("01HF7YAT00ABCDEFGHIKMNPQRS"));
        assert!(!is_canonical("01HF7YAT00ABCDEFGHJKMNPQR"));
        assert!(!is_canonical("my-cafe"));
        assert!(!is_canonical(""));
    }

    #[test]
    fn test_encode_base32_edges() {
        assert_eq!(encode_base32(0), "0".repeat(26));
        assert_eq!(encode_base32(u128::MAX), format!("7{}", "Z".repeat(25)));
    }

    #[test]
    fn test_location_id_serde() {
        let id = generate_canonical_id("my-cafe");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: LocationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<LocationId>("\"my-cafe\"").is_err());
    }
}
