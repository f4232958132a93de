use custom_mcp::{
    build_registry, clients::build_http_client, config::Config, errors::StartupError, logging,
    mcp::transport::serve, Services,
};
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("custom-mcp: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let config = Config::from_env()?;
    let http = build_http_client()?;
    let registry = build_registry(Services::from_config(&config, http))?;

    info!(
        tools = registry.len(),
        github_token = config.github_token.is_some(),
        slack_token = config.slack_bot_token.is_some(),
        youtube_api_key = config.youtube_api_key.is_some(),
        gemini_api_key = config.gemini_api_key.is_some(),
        "server configured"
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let summary = serve(&registry, stdin, stdout, shutdown).await?;
    info!(
        lines = summary.lines_handled,
        reason = ?summary.reason,
        "server stopped"
    );
    Ok(())
}
