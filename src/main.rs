use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use qrtally::cli::{Cli, Commands};
use qrtally::config::init_config;
use qrtally::interfaces::cli::run_command;
use qrtally::runtime::run_server;
use qrtally::system::{logging::init_logging, panic_handler::install_panic_hook};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = init_config(&cli.config);
    // guard 需要存活到进程退出，保证日志刷盘
    let _log_guard = init_logging(&config.logging)?;
    install_panic_hook();

    match cli.command {
        None | Some(Commands::Serve) => {
            info!("qrtally {} starting", env!("CARGO_PKG_VERSION"));
            run_server(config).await
        }
        Some(command) => {
            if let Err(e) = run_command(command, config).await {
                error!("Command failed: {}", e);
                #[cfg(feature = "cli")]
                eprintln!("{}", e.format_colored());
                #[cfg(not(feature = "cli"))]
                eprintln!("{}", e.format_simple());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
