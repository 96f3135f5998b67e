use clap::Parser;

use jsonheal::proxy::config::ProxyConfig;

#[tokio::main]
async fn main() {
    let config = ProxyConfig::parse();
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
    jsonheal::proxy::init_tracing(&config);
    if let Err(e) = jsonheal::proxy::run(config).await {
        tracing::error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
