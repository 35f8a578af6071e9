use std::cmp::Reverse;

use chrono::NaiveDate;

use super::model::CampaignDefinition;
use crate::identity::LocationId;

/// 选出某位置在某天生效的活动
///
/// 候选条件：属于该位置、`start <= day <= end`、状态不是 `ended`。
/// 多个候选时：`priority` 高者优先；其次开始日期最晚者优先（无开始日期视为最早）；
/// 仍相同则取列表中靠前的。
pub fn pick_active_campaign<'a>(
    campaigns: &'a [CampaignDefinition],
    location: &LocationId,
    day: NaiveDate,
) -> Option<&'a CampaignDefinition> {
    campaigns
        .iter()
        .enumerate()
        .filter(|(_, c)| is_running(c, location, day))
        .min_by_key(|(idx, c)| (Reverse(c.priority), Reverse(c.start), *idx))
        .map(|(_, c)| c)
}

/// 按活动 key 查找，只返回当天对该位置生效的那一条
///
/// 同一位置同一 key 出现多次时取列表中靠前的生效条目。
pub fn find_active_campaign<'a>(
    campaigns: &'a [CampaignDefinition],
    location: &LocationId,
    key: &str,
    day: NaiveDate,
) -> Option<&'a CampaignDefinition> {
    campaigns
        .iter()
        .find(|c| c.key == key && is_running(c, location, day))
}

fn is_running(campaign: &CampaignDefinition, location: &LocationId, day: NaiveDate) -> bool {
    &campaign.location == location && !campaign.is_ended() && campaign.covers(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::generate_canonical_id;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn campaign(
        location: &LocationId,
        key: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> CampaignDefinition {
        CampaignDefinition {
            location: location.clone(),
            key: key.to_string(),
            name: None,
            brand: None,
            start,
            end,
            status: "active".to_string(),
            discount: None,
            priority: 0,
        }
    }

    #[test]
    fn test_empty_when_nothing_qualifies() {
        let loc = generate_canonical_id("cafe");
        let other = generate_canonical_id("bar");
        assert!(pick_active_campaign(&[], &loc, day(10)).is_none());

        let mut ended = campaign(&loc, "ENDED", None, None);
        ended.status = "ended".to_string();
        let list = vec![
            ended,
            campaign(&loc, "FUTURE", Some(day(20)), None),
            campaign(&loc, "PAST", None, Some(day(5))),
            campaign(&other, "ELSEWHERE", None, None),
        ];
        assert!(pick_active_campaign(&list, &loc, day(10)).is_none());
    }

    #[test]
    fn test_window_is_inclusive() {
        let loc = generate_canonical_id("cafe");
        let list = vec![campaign(&loc, "JUNE", Some(day(1)), Some(day(30)))];
        assert_eq!(
            pick_active_campaign(&list, &loc, day(1)).map(|c| c.key.as_str()),
            Some("JUNE")
        );
        assert_eq!(
            pick_active_campaign(&list, &loc, day(30)).map(|c| c.key.as_str()),
            Some("JUNE")
        );
    }

    #[test]
    fn test_find_by_key_respects_window_and_owner() {
        let loc = generate_canonical_id("cafe");
        let other = generate_canonical_id("bar");
        let mut ended = campaign(&loc, "WINTER", None, None);
        ended.status = "ended".to_string();
        let list = vec![
            campaign(&loc, "SUMMER", Some(day(1)), Some(day(30))),
            ended,
            campaign(&other, "AUTUMN", None, None),
        ];

        assert_eq!(
            find_active_campaign(&list, &loc, "SUMMER", day(10)).map(|c| c.key.as_str()),
            Some("SUMMER")
        );
        assert!(find_active_campaign(&list, &loc, "WINTER", day(10)).is_none());
        assert!(find_active_campaign(&list, &loc, "AUTUMN", day(10)).is_none());
        assert!(find_active_campaign(&list, &loc, "SPRING", day(10)).is_none());
    }

    #[test]
    fn test_tie_break_priority_then_latest_start_then_order() {
        let loc = generate_canonical_id("cafe");

        let mut boosted = campaign(&loc, "BOOSTED", Some(day(1)), None);
        boosted.priority = 5;
        let list = vec![
            campaign(&loc, "OPEN", None, None),
            campaign(&loc, "RECENT", Some(day(8)), None),
            boosted,
        ];
        assert_eq!(
            pick_active_campaign(&list, &loc, day(10)).unwrap().key,
            "BOOSTED"
        );

        let list = vec![
            campaign(&loc, "OPEN", None, None),
            campaign(&loc, "OLDER", Some(day(2)), None),
            campaign(&loc, "RECENT", Some(day(8)), None),
        ];
        assert_eq!(
            pick_active_campaign(&list, &loc, day(10)).unwrap().key,
            "RECENT"
        );

        let list = vec![
            campaign(&loc, "FIRST", Some(day(3)), None),
            campaign(&loc, "SECOND", Some(day(3)), None),
        ];
        assert_eq!(
            pick_active_campaign(&list, &loc, day(10)).unwrap().key,
            "FIRST"
        );
    }
}
