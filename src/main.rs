use clap::Parser;

use mailbeacon::config::{init_config, init_config_from};
use mailbeacon::runtime::modes::run_server;
use mailbeacon::system::logging::init_logging;

/// Mailbeacon - email campaign engagement tracking service
#[derive(Parser)]
#[command(name = "mailbeacon")]
#[command(version)]
#[command(about = "Email campaign engagement tracking service", long_about = None)]
struct Cli {
    /// Path to the configuration file (default: config.toml, or MB_CONFIG_PATH)
    #[arg(long, short = 'c')]
    config: Option<String>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => init_config_from(path),
        None => init_config(),
    };

    // guard 必须存活到进程退出，否则缓冲日志会丢
    let _log_guard = init_logging(&config.logging);

    if let Err(e) = run_server().await {
        tracing::error!("Server error: {}", e);
        return Err(std::io::Error::other(e.to_string()));
    }

    Ok(())
}
