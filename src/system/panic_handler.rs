//! Panic handler module
//!
//! 服务模式下，请求处理中的 panic 由 `FaultBarrier` 中间件兜底转换为 500，
//! 进程继续运行；这里的 hook 只负责把 panic 信息写入 tracing 日志，
//! 不再直接打印到 stderr。

use std::any::Any;
use std::panic;

use tracing::error;

/// Install custom panic hook that routes panic reports through tracing
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let message = panic_message(panic_info.payload());
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "Unknown location".to_string());

        let backtrace = std::backtrace::Backtrace::capture();
        error!(
            panic.message = %message,
            panic.location = %location,
            "Panic captured: {}\n{}",
            message,
            backtrace
        );
    }));
}

/// 从 panic payload 中提取可读消息
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
