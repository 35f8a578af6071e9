pub mod server;

pub use server::{build_cors, run_server};
