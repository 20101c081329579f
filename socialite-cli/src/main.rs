mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "socialite", version, about = "OAuth2 login client for Gitee, OSChina and QQ")]
struct Cli {
    /// Config file (default: ~/.socialite/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ProviderId {
    Gitee,
    Oschina,
    Qq,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Gitee => "gitee",
            ProviderId::Oschina => "oschina",
            ProviderId::Qq => "qq",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the authorization URL to send the user to
    AuthUrl {
        provider: ProviderId,
        #[arg(long)]
        callback_url: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        scope: Option<String>,
    },

    /// Handle a callback: check state and exchange the code for a token
    Callback {
        provider: ProviderId,
        /// State saved when the authorization URL was issued
        #[arg(long)]
        stored_state: String,
        /// Raw callback query string (code=...&state=...)
        #[arg(long)]
        query: String,
        /// Redirect URI used for the authorization URL, if not the configured one
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Fetch the user profile for an access token
    UserInfo {
        provider: ProviderId,
        #[arg(long)]
        access_token: String,
    },

    /// Check whether an access token is still accepted
    Validate {
        provider: ProviderId,
        #[arg(long)]
        access_token: String,
    },

    /// Exchange a refresh token for a new access token
    Refresh {
        provider: ProviderId,
        #[arg(long)]
        refresh_token: String,
    },

    /// Gitee password login
    GiteeLogin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        scope: Option<String>,
    },

    /// QQ mini-program: exchange a js_code for the session key
    QqSessionKey {
        #[arg(long)]
        js_code: String,
    },

    /// QQ mini-program: decrypt an encryptedData payload
    QqDecrypt {
        #[arg(long)]
        encrypted_data: String,
        #[arg(long)]
        iv: String,
        #[arg(long)]
        session_key: String,
    },

    /// List supported providers
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socialite=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => socialite::ConfigManager::new(path),
        None => socialite::ConfigManager::default_path(),
    };

    let output = match cli.command {
        Commands::AuthUrl {
            provider,
            callback_url,
            state,
            scope,
        } => {
            let action = commands::Action::AuthUrl {
                callback_url,
                state,
                scope,
            };
            commands::run(&config, provider, action).await?
        }
        Commands::Callback {
            provider,
            stored_state,
            query,
            redirect_uri,
        } => {
            let action = commands::Action::Callback {
                stored_state,
                query,
                redirect_uri,
            };
            commands::run(&config, provider, action).await?
        }
        Commands::UserInfo {
            provider,
            access_token,
        } => commands::run(&config, provider, commands::Action::UserInfo { access_token }).await?,
        Commands::Validate {
            provider,
            access_token,
        } => commands::run(&config, provider, commands::Action::Validate { access_token }).await?,
        Commands::Refresh {
            provider,
            refresh_token,
        } => commands::run(&config, provider, commands::Action::Refresh { refresh_token }).await?,
        Commands::GiteeLogin {
            username,
            password,
            scope,
        } => commands::gitee_login(&config, &username, &password, scope.as_deref()).await?,
        Commands::QqSessionKey { js_code } => commands::qq_session_key(&config, &js_code).await?,
        Commands::QqDecrypt {
            encrypted_data,
            iv,
            session_key,
        } => commands::qq_decrypt(&encrypted_data, &iv, &session_key)?,
        Commands::Providers => commands::providers(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
