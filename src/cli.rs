//! CLI argument parsing, validation, and the terminal client commands.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use tracing::{error, info};
use url::Url;

use crate::ServerConfig;
use crate::api::proxy_target;
use crate::backend::{ApiBase, ApiEndpoint, BACKEND_URL_ENV, PUBLIC_API_URL_ENV};
use crate::client::{AuthClient, ClientError, RequestInit};
use crate::guard::{AdminGate, AdminState, AuthGate, AuthView, SessionSummary};
use crate::jwt;
use crate::store::{FileStore, KvCookieJar, SessionStore, TokenStore};

/// Origin that a same-origin API base resolves against.
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Client store file inside the state directory.
const TOKENS_FILE: &str = "tokens.json";

/// Cookie jar file inside the state directory.
const COOKIES_FILE: &str = "cookies.json";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "phill",
    about = "Session-aware edge server and terminal client for the Phill API"
)]
pub struct Args {
    /// Public API URL used by clients (wins over --backend-url)
    #[arg(long, global = true, env = PUBLIC_API_URL_ENV)]
    pub public_api_url: Option<String>,

    /// Backend URL, also the target of the /api proxy
    #[arg(long, global = true, env = BACKEND_URL_ENV)]
    pub backend_url: Option<String>,

    /// Origin a same-origin API base (/api) is resolved against
    #[arg(long, global = true, env = "PHILL_ORIGIN", default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    /// Directory holding the client token store and cookie jar
    #[arg(long, global = true, env = "PHILL_STATE_DIR", default_value = ".phill")]
    pub state_dir: PathBuf,

    /// Log output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the edge server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Set the Secure flag on session cookies (implied by an https origin)
        #[arg(long)]
        secure_cookies: bool,

        /// Key login rate limits on X-Forwarded-For (only behind a reverse proxy)
        #[arg(long)]
        trust_forwarded_for: bool,
    },
    /// Log in and store the token pair
    Login {
        #[arg(short, long)]
        username: String,

        /// Password; read from stdin when not set
        #[arg(long, env = "PHILL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the stored session
    Status,
    /// Check whether the stored session belongs to an admin
    AdminCheck,
    /// Send an authenticated request and print the response body
    Fetch {
        /// Path under the API base, e.g. /users/me
        path: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra header as "Name: value"; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body; sent as JSON unless a Content-Type header is given
        #[arg(short = 'd', long)]
        data: Option<String>,
    },
}

/// Errors from the terminal client commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Input(String),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend answered {0}")]
    Status(u16),
    #[error("{0}")]
    Denied(String),
}

/// Initialize logging based on the specified format.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_logging(format: &LogFormat) {
    let builder = tracing_subscriber::fmt().with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Parse the origin and resolve the API base.
/// Returns None and logs an error if validation fails.
pub fn api_endpoint(args: &Args) -> Option<ApiEndpoint> {
    let origin = match Url::parse(&args.origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %args.origin, error = %e, "Invalid origin URL");
            return None;
        }
    };

    let base = ApiBase::resolve(args.public_api_url.as_deref(), args.backend_url.as_deref());
    info!(api_base = %base, "Resolved API base");
    Some(ApiEndpoint::new(base, origin))
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    api: ApiEndpoint,
    backend_url: Option<&str>,
    secure_cookies: bool,
    trust_forwarded_for: bool,
) -> ServerConfig {
    let secure_cookies = secure_cookies || api.origin().scheme() == "https";
    let proxy_target = proxy_target(backend_url);
    match &proxy_target {
        Some(target) => info!(target = %target, "Proxying /api to backend"),
        None => info!("Backend URL is not absolute, /api proxy disabled"),
    }

    ServerConfig {
        api,
        proxy_target,
        secure_cookies,
        trust_forwarded_for,
    }
}

/// Token store persisted in the state directory.
pub type FileTokenStore = TokenStore<FileStore, KvCookieJar<FileStore>>;

pub fn open_store(state_dir: &Path) -> FileTokenStore {
    TokenStore::new(
        FileStore::new(state_dir.join(TOKENS_FILE)),
        KvCookieJar::new(FileStore::new(state_dir.join(COOKIES_FILE))),
    )
}

fn read_password() -> Result<String, CommandError> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), CommandError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| CommandError::Input(format!("Header must be \"Name: value\": {}", raw)))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| CommandError::Input(format!("Invalid header name {:?}: {}", name, e)))?;
    let value = HeaderValue::from_str(value.trim()).map_err(ClientError::from)?;
    Ok((name, value))
}

/// Build the request for `phill fetch`.
pub fn fetch_request(
    method: &str,
    headers: &[String],
    data: Option<&str>,
) -> Result<RequestInit, CommandError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CommandError::Input(format!("Invalid method: {}", method)))?;

    let mut init = RequestInit::new(method);
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        init = init.header(name, value);
    }
    if let Some(data) = data {
        if !init.headers.contains_key(CONTENT_TYPE) {
            init = init.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        init = init.body(data.as_bytes().to_vec());
    }
    Ok(init)
}

fn print_summary(summary: &SessionSummary) {
    if summary.authenticated {
        println!("Session:       authenticated");
    } else {
        println!("Session:       not signed in");
    }
    println!("API base:      {}", summary.api_base);
    println!("Health:        {}", summary.health_url);
    if let Some(preview) = &summary.token_preview {
        println!("Access token:  {}", preview);
        println!(
            "Refresh:       {}",
            if summary.refresh_present { "present" } else { "missing" }
        );
    }
    if let Some(expires_at) = summary.expires_at {
        println!("Expires (ms):  {}", jwt::unix_millis(expires_at));
    }
}

/// Run one terminal client command against the stored session.
///
/// `Serve` is handled by the binary and is rejected here.
pub async fn run_client_command(command: Command, client: &AuthClient) -> Result<(), CommandError> {
    match command {
        Command::Serve { .. } => Err(CommandError::Input(
            "serve is not a client command".to_string(),
        )),
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let pair = client.login(&username, &password).await?;
            info!(username = %username, "Logged in");
            print_summary(&SessionSummary::from_pair(Some(&pair), client.api().base()));
            Ok(())
        }
        Command::Logout => {
            client.logout();
            println!("Signed out");
            Ok(())
        }
        Command::Status => {
            let pair = match AuthGate::check(&**client.store()) {
                AuthView::Unlocked(pair) => Some(pair),
                AuthView::Locked => None,
            };
            print_summary(&SessionSummary::from_pair(pair.as_ref(), client.api().base()));
            Ok(())
        }
        Command::AdminCheck => match AdminGate::verify(client).await {
            AdminState::Ready(profile) => {
                println!(
                    "Admin access granted for {}",
                    profile.name.or(profile.email).unwrap_or_default()
                );
                Ok(())
            }
            AdminState::Unauthenticated => {
                Err(CommandError::Denied("Login required".to_string()))
            }
            AdminState::Forbidden(message) | AdminState::Error(message) => {
                Err(CommandError::Denied(message))
            }
            AdminState::Checking => Err(CommandError::Denied(
                "Admin check did not complete".to_string(),
            )),
        },
        Command::Fetch {
            path,
            method,
            headers,
            data,
        } => {
            let init = fetch_request(&method, &headers, data.as_deref())?;
            let response = client.request(&path, init).await?;
            let status = response.status();
            let body = response.text().await.map_err(ClientError::from)?;
            println!("{}", body);
            if status.is_success() {
                Ok(())
            } else {
                Err(CommandError::Status(status.as_u16()))
            }
        }
    }
}

/// Client bound to the file-backed store in `state_dir`.
pub fn open_client(api: ApiEndpoint, state_dir: &Path) -> AuthClient {
    let store: Arc<dyn SessionStore> = Arc::new(open_store(state_dir));
    AuthClient::new(api, store)
}
