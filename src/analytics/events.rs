//! 事件词表
//!
//! 计数器只接受固定词表中的事件；旧版本写入的别名（`qr`、`qr_scan` 等）
//! 仅在维护任务里识别并迁移。

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

/// 交互事件
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventKey {
    Open,
    Click,
    View,
    Social,
    Map,
    Call,
    Website,
    Menu,
    Share,
    Review,
    Rating,
    QrScan,
    QrRedeem,
    QrInvalid,
    PromoView,
}

impl EventKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Click => "click",
            Self::View => "view",
            Self::Social => "social",
            Self::Map => "map",
            Self::Call => "call",
            Self::Website => "website",
            Self::Menu => "menu",
            Self::Share => "share",
            Self::Review => "review",
            Self::Rating => "rating",
            Self::QrScan => "qr-scan",
            Self::QrRedeem => "qr-redeem",
            Self::QrInvalid => "qr-invalid",
            Self::PromoView => "promo-view",
        }
    }

    /// 只能由服务端自身产生的事件（兑换结果）
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::QrRedeem | Self::QrInvalid)
    }

    /// 识别旧版本写入的事件名
    pub fn from_legacy(raw: &str) -> Option<Self> {
        if let Ok(event) = raw.parse() {
            return Some(event);
        }
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "qr" | "qr_scan" | "qrscan" | "scan" => Some(Self::QrScan),
            "redeem" | "qr_redeem" | "qrredeem" => Some(Self::QrRedeem),
            "invalid" | "qr_invalid" | "qrinvalid" => Some(Self::QrInvalid),
            "promo_view" | "promoview" => Some(Self::PromoView),
            "opens" => Some(Self::Open),
            "clicks" => Some(Self::Click),
            "views" => Some(Self::View),
            "ratings" => Some(Self::Rating),
            "reviews" => Some(Self::Review),
            "maps" => Some(Self::Map),
            "calls" => Some(Self::Call),
            other => other.replace('_', "-").parse().ok(),
        }
    }

    /// 以逗号分隔列出全部事件（用于错误提示）
    pub fn vocabulary() -> String {
        Self::iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("Unknown event: '{}'. Valid: {}", s, Self::vocabulary()))
    }
}

/// 计数器名：事件本身，或评分总和
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterKey {
    Event(EventKey),
    RatingScore,
}

pub const RATING_SCORE: &str = "rating-score";

impl CounterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event(event) => event.as_str(),
            Self::RatingScore => RATING_SCORE,
        }
    }

    /// 严格解析（只接受规范名）
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == RATING_SCORE {
            return Some(Self::RatingScore);
        }
        raw.parse().ok().map(Self::Event)
    }

    /// 宽松解析（接受旧别名）
    pub fn from_legacy(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            RATING_SCORE | "rating_score" | "ratingscore" | "score" => Some(Self::RatingScore),
            _ => EventKey::from_legacy(raw).map(Self::Event),
        }
    }
}

impl From<EventKey> for CounterKey {
    fn from(event: EventKey) -> Self {
        Self::Event(event)
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_matches_strum_and_serde() {
        for event in EventKey::iter() {
            assert_eq!(event.as_str(), event.as_ref());
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("qr-scan".parse::<EventKey>(), Ok(EventKey::QrScan));
        assert!("qr_scan".parse::<EventKey>().is_err());
        let err = "bogus".parse::<EventKey>().unwrap_err();
        assert!(err.contains("promo-view"));
    }

    #[test]
    fn test_internal_events() {
        assert!(EventKey::QrRedeem.is_internal());
        assert!(EventKey::QrInvalid.is_internal());
        assert!(!EventKey::QrScan.is_internal());
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(EventKey::from_legacy("qr"), Some(EventKey::QrScan));
        assert_eq!(EventKey::from_legacy("QR_SCAN"), Some(EventKey::QrScan));
        assert_eq!(EventKey::from_legacy("redeem"), Some(EventKey::QrRedeem));
        assert_eq!(EventKey::from_legacy("promo_view"), Some(EventKey::PromoView));
        assert_eq!(EventKey::from_legacy("clicks"), Some(EventKey::Click));
        assert_eq!(EventKey::from_legacy("nonsense"), None);
    }

    #[test]
    fn test_counter_key() {
        assert_eq!(CounterKey::parse("rating-score"), Some(CounterKey::RatingScore));
        assert_eq!(CounterKey::parse("rating_score"), None);
        assert_eq!(
            CounterKey::from_legacy("rating_score"),
            Some(CounterKey::RatingScore)
        );
        assert_eq!(
            CounterKey::parse("open"),
            Some(CounterKey::Event(EventKey::Open))
        );
    }
}
