use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone)]
pub enum TallyError {
    InvalidRequest(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Upstream(String),
    Storage(String),
    Serialization(String),
    Internal(String),
}

impl TallyError {
    /// 对外暴露的错误码（JSON 信封中的 `error.code`）
    pub fn code(&self) -> &'static str {
        match self {
            TallyError::InvalidRequest(_) => "invalid_request",
            TallyError::NotFound(_) => "not_found",
            TallyError::Unauthorized(_) => "unauthorized",
            TallyError::Forbidden(_) => "forbidden",
            TallyError::Upstream(_) => "upstream",
            TallyError::Storage(_) | TallyError::Serialization(_) | TallyError::Internal(_) => {
                "server_error"
            }
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            TallyError::InvalidRequest(_) => "Invalid Request",
            TallyError::NotFound(_) => "Resource Not Found",
            TallyError::Unauthorized(_) => "Unauthorized",
            TallyError::Forbidden(_) => "Forbidden",
            TallyError::Upstream(_) => "Upstream Error",
            TallyError::Storage(_) => "Storage Error",
            TallyError::Serialization(_) => "Serialization Error",
            TallyError::Internal(_) => "Internal Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            TallyError::InvalidRequest(msg)
            | TallyError::NotFound(msg)
            | TallyError::Unauthorized(msg)
            | TallyError::Forbidden(msg)
            | TallyError::Upstream(msg)
            | TallyError::Storage(msg)
            | TallyError::Serialization(msg)
            | TallyError::Internal(msg) => msg,
        }
    }

    /// 映射到 HTTP 状态码
    pub fn http_status(&self) -> StatusCode {
        match self {
            TallyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            TallyError::NotFound(_) => StatusCode::NOT_FOUND,
            TallyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TallyError::Forbidden(_) => StatusCode::FORBIDDEN,
            TallyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            TallyError::Storage(_) | TallyError::Serialization(_) | TallyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 服务端故障：详情只进日志，不回给客户端
    pub fn is_server_fault(&self) -> bool {
        self.http_status().is_server_error() && !matches!(self, TallyError::Upstream(_))
    }

    /// 格式化为彩色输出（用于 CLI 模式）
    #[cfg(feature = "cli")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for TallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for TallyError {}

// 便捷的构造函数
impl TallyError {
    pub fn invalid_request<T: Into<String>>(msg: T) -> Self {
        TallyError::InvalidRequest(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        TallyError::NotFound(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        TallyError::Unauthorized(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        TallyError::Forbidden(msg.into())
    }

    pub fn upstream<T: Into<String>>(msg: T) -> Self {
        TallyError::Upstream(msg.into())
    }

    pub fn storage<T: Into<String>>(msg: T) -> Self {
        TallyError::Storage(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        TallyError::Serialization(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        TallyError::Internal(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<redis::RedisError> for TallyError {
    fn from(err: redis::RedisError) -> Self {
        TallyError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        TallyError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        TallyError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for TallyError {
    fn from(err: chrono::ParseError) -> Self {
        TallyError::InvalidRequest(format!("invalid date: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(TallyError::invalid_request("x").code(), "invalid_request");
        assert_eq!(TallyError::not_found("x").code(), "not_found");
        assert_eq!(TallyError::upstream("x").code(), "upstream");
        assert_eq!(TallyError::storage("x").code(), "server_error");
        assert_eq!(TallyError::serialization("x").code(), "server_error");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            TallyError::unauthorized("x").http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(TallyError::forbidden("x").http_status(), StatusCode::FORBIDDEN);
        assert_eq!(TallyError::upstream("x").http_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            TallyError::internal("x").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_fault_excludes_upstream() {
        assert!(TallyError::storage("down").is_server_fault());
        assert!(!TallyError::upstream("campaign feed").is_server_fault());
        assert!(!TallyError::not_found("loc").is_server_fault());
    }

    #[test]
    fn test_format_simple() {
        let err = TallyError::not_found("unknown location: my-cafe");
        assert_eq!(
            err.to_string(),
            "Resource Not Found: unknown location: my-cafe"
        );
    }
}
