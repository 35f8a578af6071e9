//! 活动元数据
//!
//! 外部 JSON 字段名不统一（`locationId` / `location_id` / `location` ……），
//! 在边界处一次性解析成强类型并补默认值。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analytics::day::parse_legacy_day;
use crate::identity::LocationId;

/// 外部活动记录（宽松格式）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCampaign {
    #[serde(
        default,
        alias = "locationId",
        alias = "location_id",
        alias = "locationID",
        alias = "loc"
    )]
    pub location: Option<String>,
    #[serde(
        default,
        alias = "campaignKey",
        alias = "campaign_key",
        alias = "campaign",
        alias = "id"
    )]
    pub key: Option<String>,
    #[serde(default, alias = "title")]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default, alias = "startDate", alias = "start_date", alias = "from")]
    pub start: Option<serde_json::Value>,
    #[serde(default, alias = "endDate", alias = "end_date", alias = "to")]
    pub end: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "offer")]
    pub discount: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Option<serde_json::Value>,
}

/// 解析活动列表：顶层数组或 `{ "campaigns": [...] }`，单条记录格式错误时跳过
pub fn parse_listing(value: serde_json::Value) -> Vec<RawCampaign> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("campaigns") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                warn!("Campaign listing object has no 'campaigns' array");
                return Vec::new();
            }
        },
        _ => {
            warn!("Campaign listing is neither an array nor an object");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawCampaign>(item) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("Skipping malformed campaign record: {}", e);
                None
            }
        })
        .collect()
}

/// 活动定义（位置已规范化）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDefinition {
    pub location: LocationId,
    pub key: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// 小写；缺省为 `active`
    pub status: String,
    pub discount: Option<String>,
    pub priority: i64,
}

impl CampaignDefinition {
    pub fn is_ended(&self) -> bool {
        self.status == "ended"
    }

    /// `start <= day <= end`，缺省的边界视为不限
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start.is_none_or(|start| start <= day) && self.end.is_none_or(|end| day <= end)
    }
}

impl RawCampaign {
    /// 原始位置字段（slug 或规范 ID）
    pub fn location_ref(&self) -> Option<&str> {
        self.location.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// 转为强类型定义；缺 key 或日期无法解析时返回 `None`
    pub fn into_definition(self, location: LocationId) -> Option<CampaignDefinition> {
        let key = self
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())?
            .to_string();

        let start = match parse_date_field(self.start.as_ref()) {
            Ok(d) => d,
            Err(raw) => {
                warn!("Campaign {}: unparseable start date {}", key, raw);
                return None;
            }
        };
        let end = match parse_date_field(self.end.as_ref()) {
            Ok(d) => d,
            Err(raw) => {
                warn!("Campaign {}: unparseable end date {}", key, raw);
                return None;
            }
        };

        let status = self
            .status
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "active".to_string());

        Some(CampaignDefinition {
            location,
            key,
            name: non_empty(self.name),
            brand: non_empty(self.brand),
            start,
            end,
            status,
            discount: self.discount.as_ref().and_then(display_value),
            priority: self.priority.as_ref().and_then(int_value).unwrap_or(0),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 日期字段：缺省、null、空串都视为不限；RFC3339 只取日期部分
fn parse_date_field(value: Option<&serde_json::Value>) -> Result<Option<NaiveDate>, String> {
    let raw = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(serde_json::Value::String(s)) => s.trim(),
        Some(other) => return Err(other.to_string()),
    };
    let date_part = raw.split('T').next().unwrap_or(raw);
    parse_legacy_day(date_part)
        .map(Some)
        .ok_or_else(|| raw.to_string())
}

fn display_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

fn int_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::generate_canonical_id;
    use serde_json::json;

    #[test]
    fn test_lenient_field_names() {
        let raws = parse_listing(json!([
            {
                "locationId": "my-cafe",
                "campaignKey": "SUMMER",
                "title": "Summer deal",
                "startDate": "2025-06-01T00:00:00Z",
                "end_date": "2025-6-30",
                "status": " Active ",
                "discount": 10,
                "priority": "2"
            }
        ]));
        assert_eq!(raws.len(), 1);
        assert_eq!(raws[0].location_ref(), Some("my-cafe"));

        let loc = generate_canonical_id("my-cafe");
        let def = raws[0].clone().into_definition(loc.clone()).unwrap();
        assert_eq!(def.key, "SUMMER");
        assert_eq!(def.name.as_deref(), Some("Summer deal"));
        assert_eq!(def.start, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(def.end, NaiveDate::from_ymd_opt(2025, 6, 30));
        assert_eq!(def.status, "active");
        assert_eq!(def.discount.as_deref(), Some("10"));
        assert_eq!(def.priority, 2);
        assert_eq!(def.location, loc);
    }

    #[test]
    fn test_wrapped_listing_and_skips() {
        let raws = parse_listing(json!({
            "campaigns": [
                { "location": "a", "key": "K1" },
                "not an object",
                { "location": "b", "key": "K2", "start": "" }
            ]
        }));
        assert_eq!(raws.len(), 2);
        assert!(parse_listing(json!("nope")).is_empty());
    }

    #[test]
    fn test_definition_requires_key_and_valid_dates() {
        let loc = generate_canonical_id("x");
        let no_key = RawCampaign {
            location: Some("x".into()),
            ..Default::default()
        };
        assert!(no_key.into_definition(loc.clone()).is_none());

        let bad_date = RawCampaign {
            key: Some("K".into()),
            start: Some(json!("someday")),
            ..Default::default()
        };
        assert!(bad_date.into_definition(loc.clone()).is_none());

        let open = RawCampaign {
            key: Some("K".into()),
            start: Some(serde_json::Value::Null),
            ..Default::default()
        };
        let def = open.into_definition(loc).unwrap();
        assert!(def.start.is_none() && def.end.is_none());
        assert_eq!(def.priority, 0);
    }

    #[test]
    fn test_covers_and_ended() {
        let loc = generate_canonical_id("x");
        let def = RawCampaign {
            key: Some("K".into()),
            start: Some(json!("2025-06-01")),
            end: Some(json!("2025-06-30")),
            status: Some("Ended".into()),
            ..Default::default()
        }
        .into_definition(loc)
        .unwrap();
        assert!(def.is_ended());
        assert!(def.covers(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        assert!(def.covers(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()));
        assert!(!def.covers(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
        assert!(!def.covers(NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()));
    }
}
