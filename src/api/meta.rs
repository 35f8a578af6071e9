//! 请求元数据提取与流量过滤

use actix_web::HttpRequest;
use tracing::trace;
use woothee::parser::Parser;

use crate::analytics::RequestMeta;
use crate::config::ApiConfig;

/// 预取 / 预渲染标记头
const PURPOSE_HEADERS: &[&str] = &["purpose", "sec-purpose", "x-purpose", "x-moz"];
const PURPOSE_MARKERS: &[&str] = &["prefetch", "prerender", "preview"];

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 从边缘请求头提取元数据（不读取 IP）
pub fn extract_meta(req: &HttpRequest, api: &ApiConfig) -> RequestMeta {
    let user_agent = header(req, "user-agent").map(str::to_string);

    // 只保留首选语言
    let language = header(req, "accept-language")
        .and_then(|raw| raw.split(',').next())
        .and_then(|tag| tag.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .map(str::to_string);

    // XX：未知，T1：Tor
    let country = header(req, &api.country_header)
        .map(str::to_ascii_uppercase)
        .filter(|c| c != "XX" && c != "T1");

    let city = header(req, &api.city_header).map(|raw| {
        urlencoding::decode(raw)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| raw.to_string())
    });

    let timezone = header(req, &api.timezone_header).map(str::to_string);

    RequestMeta {
        user_agent,
        language,
        country,
        city,
        timezone,
    }
}

/// 是否为真人导航
///
/// 预取 / 预渲染、缺少 UA、爬虫 UA 都不计数（跳转照常进行）。
pub fn is_human_navigation(req: &HttpRequest) -> bool {
    for name in PURPOSE_HEADERS {
        if let Some(value) = header(req, name) {
            let value = value.to_ascii_lowercase();
            if PURPOSE_MARKERS.iter().any(|m| value.contains(m)) {
                trace!("Filtered {} request: {}={}", req.path(), name, value);
                return false;
            }
        }
    }

    let Some(ua) = header(req, "user-agent") else {
        trace!("Filtered {} request: missing user agent", req.path());
        return false;
    };

    match Parser::new().parse(ua) {
        Some(result) if result.category == "crawler" => {
            trace!("Filtered {} request: crawler {}", req.path(), result.name);
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
    const BOT_UA: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_extract_meta() {
        let req = TestRequest::default()
            .insert_header(("user-agent", BROWSER_UA))
            .insert_header(("accept-language", "de-DE,de;q=0.9,en;q=0.8"))
            .insert_header(("cf-ipcountry", "de"))
            .insert_header(("cf-ipcity", "M%C3%BCnchen"))
            .insert_header(("cf-timezone", "Europe/Berlin"))
            .to_http_request();
        let meta = extract_meta(&req, &ApiConfig::default());
        assert_eq!(meta.user_agent.as_deref(), Some(BROWSER_UA));
        assert_eq!(meta.language.as_deref(), Some("de-DE"));
        assert_eq!(meta.country.as_deref(), Some("DE"));
        assert_eq!(meta.city.as_deref(), Some("München"));
        assert_eq!(meta.timezone.as_deref(), Some("Europe/Berlin"));
    }

    #[test]
    fn test_unknown_country_dropped() {
        let req = TestRequest::default()
            .insert_header(("cf-ipcountry", "XX"))
            .to_http_request();
        let meta = extract_meta(&req, &ApiConfig::default());
        assert_eq!(meta.country, None);
        assert_eq!(meta.user_agent, None);
    }

    #[test]
    fn test_human_navigation() {
        let human = TestRequest::default()
            .insert_header(("user-agent", BROWSER_UA))
            .to_http_request();
        assert!(is_human_navigation(&human));

        let bot = TestRequest::default()
            .insert_header(("user-agent", BOT_UA))
            .to_http_request();
        assert!(!is_human_navigation(&bot));

        let prefetch = TestRequest::default()
            .insert_header(("user-agent", BROWSER_UA))
            .insert_header(("sec-purpose", "prefetch;prerender"))
            .to_http_request();
        assert!(!is_human_navigation(&prefetch));

        let anonymous = TestRequest::default().to_http_request();
        assert!(!is_human_navigation(&anonymous));
    }
}
