use clap::Parser;
use phill_session::cli::{
    Args, Command, api_endpoint, build_config, init_logging, open_client, run_client_command,
};
use phill_session::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(api) = api_endpoint(&args) else {
        std::process::exit(1);
    };

    let (port, secure_cookies, trust_forwarded_for) = match args.command {
        Command::Serve {
            port,
            secure_cookies,
            trust_forwarded_for,
        } => (port, secure_cookies, trust_forwarded_for),
        command => {
            let client = open_client(api, &args.state_dir);
            if let Err(e) = run_client_command(command, &client).await {
                error!(error = %e, "Command failed");
                std::process::exit(1);
            }
            return;
        }
    };

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(
        api,
        args.backend_url.as_deref(),
        secure_cookies,
        trust_forwarded_for,
    );

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
