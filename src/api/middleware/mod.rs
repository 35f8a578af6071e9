pub mod admin_auth;
pub mod fault;
pub mod request_id;

pub use admin_auth::AdminAuth;
pub use fault::FaultBarrier;
pub use request_id::{RequestId, RequestIdMiddleware};
