use box_planner::config::AppConfig;
use box_planner::{api, init_tracing};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // .env may carry RUST_LOG, so load it before the subscriber is installed.
    let dotenv_result = dotenvy::dotenv();
    init_tracing();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    info!("🚀 Box planner starting...");
    if let Err(err) =
        api::start_api_server(app_config.api, app_config.planner, app_config.export).await
    {
        error!("❌ Server stopped: {}", err);
        std::process::exit(1);
    }
}
