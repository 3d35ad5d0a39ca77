//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. omni-callback.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "omni-callback.toml";

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the webhook server
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Messaging platform (OmniChat) configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct OmniConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Platform username used for the token exchange
    pub username: String,

    /// Platform password used for the token exchange
    #[serde(skip_serializing)]
    pub password: String,

    /// Sent as `X-Calling-Application` on the token exchange
    pub app_name: String,

    /// Account every contact and broadcast is scoped to
    pub api_account_id: String,

    /// Template sent to every caller
    pub template_id: String,

    /// Timeout applied to every outbound request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OmniConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: String::new(),
            password: String::new(),
            app_name: String::new(),
            api_account_id: String::new(),
            template_id: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// password は出力しない
impl std::fmt::Debug for OmniConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmniConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("app_name", &self.app_name)
            .field("api_account_id", &self.api_account_id)
            .field("template_id", &self.template_id)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Twilio inbound webhook configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TwilioConfig {
    /// Auth token used to validate `X-Twilio-Signature`
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,

    /// Whether inbound requests must carry a valid signature
    #[serde(default)]
    pub validate_signature: bool,

    /// Public URL Twilio posts to, as configured in the Twilio console.
    /// Required for signature validation since the server usually sits
    /// behind a proxy.
    pub webhook_url: Option<String>,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("validate_signature", &self.validate_signature)
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

/// Main configuration for omni-callback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Webhook server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Messaging platform configuration
    #[serde(default)]
    pub omni: OmniConfig,

    /// Twilio configuration
    #[serde(default)]
    pub twilio: TwilioConfig,
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://api.omnichat.co.uk".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                while let Some(c) = chars.next() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後、設定済みの環境変数で上書きされます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Parse a TOML document after expanding `${VAR}` references
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded)?;
        Ok(Self::from_toml_config(toml))
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./omni-callback.toml` があればそれを使い、
    /// なければ環境変数のみから読み込みます。
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Ok(Self::from_env())
    }

    /// TOML 構造から Config を構築
    fn from_toml_config(toml: TomlConfig) -> Self {
        let server = toml.server.unwrap_or_default();
        let omni = toml.omni.unwrap_or_default();
        let twilio = toml.twilio.unwrap_or_default();

        Config {
            server: ServerConfig {
                port: server.port.unwrap_or_else(default_port),
            },
            omni: OmniConfig {
                base_url: omni.base_url.unwrap_or_else(default_base_url),
                username: omni.username.unwrap_or_default(),
                password: omni.password.unwrap_or_default(),
                app_name: omni.app_name.unwrap_or_default(),
                api_account_id: omni.api_account_id.unwrap_or_default(),
                template_id: omni.template_id.unwrap_or_default(),
                request_timeout_secs: omni
                    .request_timeout_secs
                    .unwrap_or_else(default_request_timeout_secs),
            },
            twilio: TwilioConfig {
                auth_token: twilio.auth_token.and_then(non_empty),
                validate_signature: twilio.validate_signature.unwrap_or(false),
                webhook_url: twilio.webhook_url.and_then(non_empty),
            },
        }
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(url) = std::env::var("OMNI_BASE_URL") {
            if !url.is_empty() {
                self.omni.base_url = url;
            }
        }
        if let Ok(username) = std::env::var("OMNI_USERNAME") {
            self.omni.username = username;
        }
        if let Ok(password) = std::env::var("OMNI_PASSWORD") {
            self.omni.password = password;
        }
        if let Ok(app_name) = std::env::var("OMNI_APP_NAME") {
            self.omni.app_name = app_name;
        }
        if let Ok(account_id) = std::env::var("OMNI_API_ACCOUNT_ID") {
            self.omni.api_account_id = account_id;
        }
        if let Ok(template_id) = std::env::var("OMNI_TEMPLATE_ID") {
            self.omni.template_id = template_id;
        }
        if let Ok(timeout) = std::env::var("OMNI_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.omni.request_timeout_secs = t;
            }
        }

        if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = non_empty(token);
        }
        if let Ok(flag) = std::env::var("TWILIO_VALIDATE_SIGNATURE") {
            self.twilio.validate_signature = parse_flag(&flag);
        }
        if let Ok(url) = std::env::var("TWILIO_WEBHOOK_URL") {
            self.twilio.webhook_url = non_empty(url);
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Check that everything the workflow needs is present
    pub fn validate(&self) -> crate::Result<()> {
        let required = [
            ("OMNI_BASE_URL", &self.omni.base_url),
            ("OMNI_USERNAME", &self.omni.username),
            ("OMNI_PASSWORD", &self.omni.password),
            ("OMNI_APP_NAME", &self.omni.app_name),
            ("OMNI_API_ACCOUNT_ID", &self.omni.api_account_id),
            ("OMNI_TEMPLATE_ID", &self.omni.template_id),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!("{} not set", missing.join(", "))));
        }

        if self.omni.request_timeout_secs == 0 {
            return Err(Error::Config("OMNI_TIMEOUT_SECS must be greater than zero".to_string()));
        }

        if self.twilio.validate_signature {
            if self.twilio.auth_token.is_none() {
                return Err(Error::Config(
                    "TWILIO_AUTH_TOKEN is required when signature validation is enabled".to_string(),
                ));
            }
            if self.twilio.webhook_url.is_none() {
                return Err(Error::Config(
                    "TWILIO_WEBHOOK_URL is required when signature validation is enabled".to_string(),
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// TOML 構造体定義（ファイル解析用）
// ============================================================================

/// TOML ファイル用のトップレベル構造
#[derive(Debug, Deserialize)]
struct TomlConfig {
    /// サーバー設定
    server: Option<TomlServerConfig>,
    /// OmniChat 設定
    omni: Option<TomlOmniConfig>,
    /// Twilio 設定
    twilio: Option<TomlTwilioConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    /// ポート番号
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlOmniConfig {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    app_name: Option<String>,
    api_account_id: Option<String>,
    template_id: Option<String>,
    /// リクエストタイムアウト（秒）
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlTwilioConfig {
    auth_token: Option<String>,
    /// 署名検証の有効/無効
    validate_signature: Option<bool>,
    webhook_url: Option<String>,
}
