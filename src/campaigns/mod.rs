//! 推广活动：外部元数据、生效活动匹配

mod matcher;
mod model;
mod source;

pub use matcher::{find_active_campaign, pick_active_campaign};
pub use model::{CampaignDefinition, RawCampaign, parse_listing};
pub use source::{
    CampaignCatalog, CampaignSource, HttpCampaignSource, StaticCampaignSource, create_source,
};
