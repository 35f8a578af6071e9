//! Service layer for business logic
//!
//! This module provides unified business logic that can be shared between
//! different interfaces (HTTP API, CLI).

mod maintenance;
pub mod qr;
mod redemption;
mod tracking;

pub use maintenance::*;
pub use redemption::*;
pub use tracking::*;
