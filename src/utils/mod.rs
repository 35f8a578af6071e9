#[cfg(feature = "cli")]
pub mod csv_handler;
pub mod url_validator;

/// 兑换令牌字母表（去掉易混淆字符）
const TOKEN_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTVWXYZabcdefghjkmnpqrstvwxyz23456789";

/// 日志记录 ID 字母表
const SHORT_ID_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_from(chars: &[u8], length: usize) -> String {
    use std::iter;

    iter::repeat_with(|| chars[rand::random_range(0..chars.len())] as char)
        .take(length)
        .collect()
}

/// 生成一次性兑换令牌（线程本地 CSPRNG）
pub fn generate_token(length: usize) -> String {
    random_from(TOKEN_CHARS, length)
}

/// 生成扫码日志的短 ID
pub fn generate_short_id(length: usize) -> String {
    random_from(SHORT_ID_CHARS, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token = generate_token(24);
        assert_eq!(token.len(), 24);
        assert!(token.bytes().all(|b| TOKEN_CHARS.contains(&b)));
        assert_ne!(generate_token(24), token);
    }

    #[test]
    fn test_generate_short_id() {
        let id = generate_short_id(10);
        assert_eq!(id.len(), 10);
        assert!(id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }
}
