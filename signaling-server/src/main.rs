use simplelog::{Config as LogConfig, TermLogger, TerminalMode};

use peer_call_signaling_server::config::Config;
use peer_call_signaling_server::{one_to_one, signaling_routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    TermLogger::init(config.log_level, LogConfig::default(), TerminalMode::Mixed)?;

    let relay = one_to_one::Relay::default();
    log::info!("relay listening on ws://{}/one-to-one", config.address);
    warp::serve(signaling_routes(relay)).run(config.address).await;
    Ok(())
}
