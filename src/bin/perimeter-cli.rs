use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, ORIGIN};
use reqwest::Method;
use serde_json::{json, Value};

use security_perimeter::crypto::{FieldCipher, FieldKey};
use security_perimeter::security::{generate_token, SessionVerifier};

#[derive(Parser)]
#[command(name = "perimeter-cli")]
#[command(about = "Admin CLI for the security perimeter", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000", env = "PERIMETER_URL")]
    url: String,

    /// Signed session token of an admin user.
    #[arg(short, long, env = "PERIMETER_SESSION")]
    session: Option<String>,

    #[arg(long, default_value = "session-token")]
    session_cookie: String,

    #[arg(long, default_value = "csrf-token")]
    csrf_cookie: String,

    #[arg(long, default_value = "x-csrf-token")]
    csrf_header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quarantine review
    #[command(subcommand)]
    Quarantine(QuarantineCommand),
    /// Audit log maintenance
    #[command(subcommand)]
    Audit(AuditCommand),
    /// Print a fresh field encryption key (hex)
    Keygen,
    /// Encrypt a value with the field key
    EncryptField {
        #[arg(long, env = "FIELD_ENCRYPTION_KEY")]
        key: String,
        value: String,
    },
    /// Decrypt a stored value with the field key
    DecryptField {
        #[arg(long, env = "FIELD_ENCRYPTION_KEY")]
        key: String,
        value: String,
    },
    /// Sign a session token for a user id
    SignSession {
        #[arg(long, env = "SESSION_SECRET")]
        secret: String,
        user_id: String,
    },
}

#[derive(Subcommand)]
enum QuarantineCommand {
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    Stats,
    Approve {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Reject {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum AuditCommand {
    Cleanup {
        #[arg(long)]
        retention_days: Option<u32>,
    },
    Recent {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (method, path, body) = match &cli.command {
        Commands::Keygen => {
            println!("{}", FieldKey::generate().to_hex());
            return Ok(());
        }
        Commands::EncryptField { key, value } => {
            println!("{}", FieldCipher::from_config_key(key)?.encrypt(value)?);
            return Ok(());
        }
        Commands::DecryptField { key, value } => {
            println!("{}", FieldCipher::from_config_key(key)?.decrypt(value));
            return Ok(());
        }
        Commands::SignSession { secret, user_id } => {
            println!("{}", SessionVerifier::new(secret, cli.session_cookie.as_str())?.sign(user_id));
            return Ok(());
        }
        Commands::Quarantine(QuarantineCommand::List { status, page, page_size }) => {
            let mut path = format!("/api/admin/quarantine?page={page}&pageSize={page_size}");
            if let Some(status) = status {
                path.push_str(&format!("&status={status}"));
            }
            (Method::GET, path, None)
        }
        Commands::Quarantine(QuarantineCommand::Stats) => {
            (Method::GET, "/api/admin/quarantine/stats".to_string(), None)
        }
        Commands::Quarantine(QuarantineCommand::Approve { id, notes }) => (
            Method::POST,
            format!("/api/admin/quarantine/{id}/approve"),
            Some(json!({ "notes": notes })),
        ),
        Commands::Quarantine(QuarantineCommand::Reject { id, notes }) => (
            Method::POST,
            format!("/api/admin/quarantine/{id}/reject"),
            Some(json!({ "notes": notes })),
        ),
        Commands::Audit(AuditCommand::Cleanup { retention_days }) => (
            Method::POST,
            "/api/admin/audit/cleanup".to_string(),
            Some(json!({ "retentionDays": retention_days })),
        ),
        Commands::Audit(AuditCommand::Recent { limit }) => {
            (Method::GET, format!("/api/admin/audit/recent?limit={limit}"), None)
        }
    };

    let Some(session) = cli.session.as_deref() else {
        return Err("admin commands need --session (or PERIMETER_SESSION)".into());
    };

    // Double-submit: any token works as long as cookie and header agree.
    let csrf = generate_token();
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!(
            "{}={}; {}={}",
            cli.session_cookie, session, cli.csrf_cookie, csrf
        ))?,
    );
    headers.insert(
        reqwest::header::HeaderName::from_bytes(cli.csrf_header.as_bytes())?,
        HeaderValue::from_str(&csrf)?,
    );
    headers.insert(ORIGIN, HeaderValue::from_str(cli.url.trim_end_matches('/'))?);

    let client = reqwest::Client::new();
    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }
    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: perimeter returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
