use clap::Parser;

use shortstat::config::{CliArgs, StaticConfig};
use shortstat::runtime::modes::run_server;
use shortstat::system::logging::init_logging;

#[actix_web::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match StaticConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    if args.check {
        println!(
            "Configuration OK: {} short links, stats written to {}",
            config.links.len(),
            config.stats.dir.display()
        );
        return;
    }

    // 必须持有 guard，否则非阻塞日志不会被刷出
    let guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_server(config).await {
        tracing::error!("Server exited with error: {:#}", e);
        drop(guard);
        std::process::exit(1);
    }
    drop(guard);
}
