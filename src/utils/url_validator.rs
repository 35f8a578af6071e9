//! 跳转目标校验
//!
//! 追踪跳转只允许 https 目标，阻止开放重定向到危险协议

use url::Url;

/// 跳转目标校验错误
#[derive(Debug)]
pub enum UrlValidationError {
    EmptyUrl,
    InsecureProtocol(String),
    InvalidFormat(String),
    MissingHost,
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUrl => write!(f, "redirect target cannot be empty"),
            Self::InsecureProtocol(proto) => write!(
                f,
                "Invalid protocol: {}. Only https:// targets are allowed",
                proto
            ),
            Self::InvalidFormat(msg) => write!(f, "Invalid URL format: {}", msg),
            Self::MissingHost => write!(f, "redirect target has no host"),
        }
    }
}

impl std::error::Error for UrlValidationError {}

/// 校验并解析跳转目标
///
/// 检查项目：
/// 1. 不为空
/// 2. 协议必须是 https（javascript:, data:, http: 等一律拒绝）
/// 3. 格式有效且带主机名
pub fn validate_redirect_target(raw: &str) -> Result<Url, UrlValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlValidationError::EmptyUrl);
    }

    let url = Url::parse(raw).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;
    if url.scheme() != "https" {
        return Err(UrlValidationError::InsecureProtocol(format!(
            "{}:",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}
