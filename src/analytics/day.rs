//! 本地日历日推导
//!
//! 计数器和扫码日志都按位置本地日期分桶。时区优先级：
//! 显式时区名 > 国家代码映射 > 回退时区 > UTC

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// 日期 key 格式
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// 推导结果：本地日期及实际采用的时区名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDay {
    pub day: NaiveDate,
    pub timezone: String,
}

impl LocalDay {
    pub fn key(&self) -> String {
        format_day(self.day)
    }
}

/// 从 UTC 时刻推导本地日期
pub fn resolve_day(
    now: DateTime<Utc>,
    explicit_tz: Option<&str>,
    country: Option<&str>,
    fallback_tz: &str,
) -> LocalDay {
    match resolve_timezone(explicit_tz, country, fallback_tz) {
        Some(tz) => LocalDay {
            day: now.with_timezone(&tz).date_naive(),
            timezone: tz.name().to_string(),
        },
        None => LocalDay {
            day: now.date_naive(),
            timezone: "UTC".to_string(),
        },
    }
}

/// 按优先级选出时区；全部失败返回 `None`（调用方使用 UTC）
pub fn resolve_timezone(
    explicit_tz: Option<&str>,
    country: Option<&str>,
    fallback_tz: &str,
) -> Option<Tz> {
    explicit_tz
        .and_then(parse_tz)
        .or_else(|| country.and_then(country_timezone).and_then(parse_tz))
        .or_else(|| parse_tz(fallback_tz))
}

fn parse_tz(name: &str) -> Option<Tz> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    name.parse::<Tz>().ok()
}

/// 国家代码 -> 代表时区
///
/// 跨多个时区的国家取人口最多的时区。未知代码（含 `XX`、`T1`）返回 `None`。
pub fn country_timezone(country: &str) -> Option<&'static str> {
    let code = country.trim().to_ascii_uppercase();
    let tz = match code.as_str() {
        "DE" => "Europe/Berlin",
        "AT" => "Europe/Vienna",
        "CH" => "Europe/Zurich",
        "LI" => "Europe/Vaduz",
        "NL" => "Europe/Amsterdam",
        "BE" => "Europe/Brussels",
        "LU" => "Europe/Luxembourg",
        "FR" => "Europe/Paris",
        "MC" => "Europe/Monaco",
        "IT" => "Europe/Rome",
        "ES" => "Europe/Madrid",
        "PT" => "Europe/Lisbon",
        "GB" | "UK" => "Europe/London",
        "IE" => "Europe/Dublin",
        "DK" => "Europe/Copenhagen",
        "NO" => "Europe/Oslo",
        "SE" => "Europe/Stockholm",
        "FI" => "Europe/Helsinki",
        "IS" => "Atlantic/Reykjavik",
        "PL" => "Europe/Warsaw",
        "CZ" => "Europe/Prague",
        "SK" => "Europe/Bratislava",
        "HU" => "Europe/Budapest",
        "SI" => "Europe/Ljubljana",
        "HR" => "Europe/Zagreb",
        "RS" => "Europe/Belgrade",
        "BA" => "Europe/Sarajevo",
        "RO" => "Europe/Bucharest",
        "BG" => "Europe/Sofia",
        "GR" => "Europe/Athens",
        "CY" => "Asia/Nicosia",
        "MT" => "Europe/Malta",
        "EE" => "Europe/Tallinn",
        "LV" => "Europe/Riga",
        "LT" => "Europe/Vilnius",
        "UA" => "Europe/Kyiv",
        "TR" => "Europe/Istanbul",
        "RU" => "Europe/Moscow",
        "US" => "America/New_York",
        "CA" => "America/Toronto",
        "MX" => "America/Mexico_City",
        "BR" => "America/Sao_Paulo",
        "AR" => "America/Argentina/Buenos_Aires",
        "CL" => "America/Santiago",
        "CO" => "America/Bogota",
        "PE" => "America/Lima",
        "AE" => "Asia/Dubai",
        "IL" => "Asia/Jerusalem",
        "SA" => "Asia/Riyadh",
        "EG" => "Africa/Cairo",
        "MA" => "Africa/Casablanca",
        "ZA" => "Africa/Johannesburg",
        "NG" => "Africa/Lagos",
        "KE" => "Africa/Nairobi",
        "IN" => "Asia/Kolkata",
        "TH" => "Asia/Bangkok",
        "VN" => "Asia/Ho_Chi_Minh",
        "ID" => "Asia/Jakarta",
        "SG" => "Asia/Singapore",
        "MY" => "Asia/Kuala_Lumpur",
        "PH" => "Asia/Manila",
        "CN" => "Asia/Shanghai",
        "HK" => "Asia/Hong_Kong",
        "TW" => "Asia/Taipei",
        "KR" => "Asia/Seoul",
        "JP" => "Asia/Tokyo",
        "AU" => "Australia/Sydney",
        "NZ" => "Pacific/Auckland",
        _ => return None,
    };
    Some(tz)
}

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// 严格解析 `YYYY-MM-DD`（必须补零）
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let day = NaiveDate::parse_from_str(raw, DAY_FORMAT).ok()?;
    (format_day(day) == raw).then_some(day)
}

/// 宽松解析旧数据中的日期：`2025-6-1`、`2025/06/01`、`20250601`
pub fn parse_legacy_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(raw, "%Y%m%d").ok();
    }

    let mut parts = raw.split(['-', '/', '.']);
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(1000..=9999).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}
