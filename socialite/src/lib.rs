pub mod client;
pub mod config;
pub mod error;
pub mod providers;
pub mod response;
pub mod sanitize;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use client::OAuth2Client;
pub use config::{AppConfig, ConfigManager, ProviderSettings};
pub use error::{AuthError, ErrorKind};
pub use providers::gitee::Gitee;
pub use providers::oschina::OsChina;
pub use providers::qq::Qq;
pub use providers::qq_mini_program::{decrypt_user_data, MiniProgramSession};
pub use providers::{Provider, ProviderContext};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, TransportError};
pub use types::*;
