//! 位置身份：规范 ID 与 slug 别名

mod canonical;
mod resolver;

pub use canonical::{
    ALPHABET, CANONICAL_LEN, LocationId, generate_canonical_id, is_canonical, normalize_slug,
};
pub use resolver::{IdentityResolver, alias_key};
