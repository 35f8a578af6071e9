pub mod admin;
pub mod health;
pub mod promo;
pub mod stats;
pub mod track;

pub use admin::{AdminService, admin_routes};
pub use health::{HealthService, health_routes};
pub use promo::{PromoService, promo_routes};
pub use stats::{StatsService, stats_routes};
pub use track::{INTERNAL_HIT_HEADER, TrackService, track_routes};
