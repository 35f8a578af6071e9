use serde::{Deserialize, Serialize};

/// 静态配置（从 TOML + 环境变量加载，启动时使用）
///
/// - server: 监听地址、端口、worker 数量
/// - store: KV 后端（memory / redis）
/// - logging: 日志配置
/// - analytics: 计数器 / 扫码日志 / 兑换令牌的 TTL 与时区回退
/// - campaigns: 外部活动元数据来源
/// - api: 对外 URL、管理令牌、边缘元数据请求头
/// - cors: 跨域白名单
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub campaigns: CampaignsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：QRT，分隔符：__
    /// 示例：QRT__SERVER__PORT=9999
    pub fn load(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("QRT")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// KV 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `memory` 或 `redis`
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default)]
    pub redis: RedisConfig,
    /// 范围扫描时每页的 key 数量
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 分析统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_counter_ttl_days")]
    pub counter_ttl_days: u64,
    #[serde(default = "default_scan_ttl_days")]
    pub scan_ttl_days: u64,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: u64,
    /// 请求未携带时区、国家也无法映射时使用的 IANA 时区
    #[serde(default = "default_fallback_timezone")]
    pub fallback_timezone: String,
    #[serde(default = "default_max_range_days")]
    pub max_range_days: i64,
    /// stats 响应中最多返回的扫码记录条数
    #[serde(default = "default_max_scan_records")]
    pub max_scan_records: usize,
}

/// 外部活动元数据配置
///
/// `source_url` 优先；都未配置时活动列表为空。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignsConfig {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_campaign_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_campaign_timeout")]
    pub timeout_secs: u64,
}

/// 对外 API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 生成二维码 / 兑换链接时使用的公网地址（不带结尾 `/`）
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// 未指定 `to` 时二维码跳转的落地页，`{id}` 为占位符
    #[serde(default = "default_landing_url_template")]
    pub landing_url_template: String,
    /// 管理接口 Bearer Token，为空时管理接口不可用
    #[serde(default)]
    pub admin_token: String,
    /// `/hit/qr-redeem` 等内部事件所需的标记头取值，为空时内部事件一律拒绝
    #[serde(default)]
    pub internal_hit_secret: String,
    #[serde(default = "default_country_header")]
    pub country_header: String,
    #[serde(default = "default_city_header")]
    pub city_header: String,
    #[serde(default = "default_timezone_header")]
    pub timezone_header: String,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,
    #[serde(default = "default_cors_max_age")]
    pub max_age: usize,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_list_page_size() -> usize {
    1000
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_key_prefix() -> String {
    "qrtally:".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_counter_ttl_days() -> u64 {
    400
}

fn default_scan_ttl_days() -> u64 {
    56
}

fn default_token_ttl_days() -> u64 {
    56
}

fn default_fallback_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_max_range_days() -> i64 {
    366
}

fn default_max_scan_records() -> usize {
    500
}

fn default_campaign_cache_ttl() -> u64 {
    60
}

fn default_campaign_timeout() -> u64 {
    3
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_landing_url_template() -> String {
    "https://example.com/l/{id}".to_string()
}

fn default_country_header() -> String {
    "cf-ipcountry".to_string()
}

fn default_city_header() -> String {
    "cf-ipcity".to_string()
}

fn default_timezone_header() -> String {
    "cf-timezone".to_string()
}

fn default_allow_credentials() -> bool {
    true
}

fn default_cors_max_age() -> usize {
    3600
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            workers: default_workers(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis: RedisConfig::default(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            counter_ttl_days: default_counter_ttl_days(),
            scan_ttl_days: default_scan_ttl_days(),
            token_ttl_days: default_token_ttl_days(),
            fallback_timezone: default_fallback_timezone(),
            max_range_days: default_max_range_days(),
            max_scan_records: default_max_scan_records(),
        }
    }
}

impl Default for CampaignsConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            file: None,
            cache_ttl_secs: default_campaign_cache_ttl(),
            timeout_secs: default_campaign_timeout(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            landing_url_template: default_landing_url_template(),
            admin_token: String::new(),
            internal_hit_secret: String::new(),
            country_header: default_country_header(),
            city_header: default_city_header(),
            timezone_header: default_timezone_header(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: default_allow_credentials(),
            max_age: default_cors_max_age(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StaticConfig::default();
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.analytics.scan_ttl_days, 56);
        assert_eq!(config.analytics.token_ttl_days, 56);
        assert_eq!(config.analytics.counter_ttl_days, 400);
        assert!(config.api.admin_token.is_empty());
        assert!(config.cors.allowed_origins.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: StaticConfig = toml::from_str(
            r#"
            [api]
            admin_token = "secret"

            [cors]
            allowed_origins = ["https://dash.example.com"]
            "#,
        )
        .unwrap();
        assert_eq!(config.api.admin_token, "secret");
        assert_eq!(config.api.country_header, "cf-ipcountry");
        assert_eq!(config.cors.allowed_origins.len(), 1);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_sample_config_roundtrips() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.analytics.fallback_timezone, "Europe/Berlin");
    }
}
