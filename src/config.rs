//! Configuração do webrtc-keeper carregada a partir de `webrtc-keeper.toml`.
//!
//! A struct [`KeeperConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `WEBRTC_BASE_URL`, `WEBRTC_USERNAME` e
//! `WEBRTC_PASSWORD` têm precedência sobre o arquivo.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::error::KeeperError;
use crate::keeper::KeeperTiming;
use crate::scheduler::Cadence;
use crate::watcher::Whitelist;

/// Arquivo lido quando `--config` não é informado.
pub const DEFAULT_CONFIG_FILE: &str = "webrtc-keeper.toml";

/// Limite da espera pelo botão "Answer": uma hora.
pub const MAX_ANSWER_WAIT_SECS: u64 = 3600;

/// Configuração de nível superior carregada de `webrtc-keeper.toml`.
#[derive(Clone, Deserialize)]
pub struct KeeperConfig {
    /// URL base do painel (ex.: `https://pbx.example.com`).
    #[serde(default)]
    pub base_url: String,

    /// Usuário de login do painel.
    #[serde(default)]
    pub username: String,

    /// Senha de login do painel.
    #[serde(default)]
    pub password: String,

    /// Linhas (did) atendidas automaticamente.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,

    /// Executável do Chrome. Sem ele, o executável é procurado no sistema.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Executa o Chrome sem janela.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Espera máxima, em segundos, pelo botão "Answer".
    #[serde(default = "default_answer_wait_secs")]
    pub answer_wait_secs: u64,

    /// Intervalo, em segundos, da verificação de chamadas.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Horário diário (HH:MM) da verificação de login.
    #[serde(default = "default_daily_verify_at")]
    pub daily_verify_at: String,

    /// Minuto e segundo (MM:SS) de cada hora em que a fila é esvaziada.
    #[serde(default = "default_hourly_clear_at")]
    pub hourly_clear_at: String,

    /// Espera fixa entre tentativas de verificação, em milissegundos.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Espera após carregar e após enviar o formulário de login, em milissegundos.
    #[serde(default = "default_login_settle_ms")]
    pub login_settle_ms: u64,

    /// Intervalo do laço principal do agendador, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Diretório para o log com rotação diária. Sem ele, só stderr.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

// Valor padrão da whitelist: "*68" (chamada de despertar).
fn default_whitelist() -> Vec<String> {
    vec!["*68".to_string()]
}

fn default_headless() -> bool {
    true
}

fn default_answer_wait_secs() -> u64 {
    9
}

// A espera implícita base é 10 s: o botão espera um segundo a menos (9 s) e a
// verificação roda a cada 10 + 1 s.
fn default_check_interval_secs() -> u64 {
    11
}

fn default_daily_verify_at() -> String {
    "00:03".to_string()
}

fn default_hourly_clear_at() -> String {
    "00:01".to_string()
}

fn default_retry_backoff_ms() -> u64 {
    3000
}

fn default_login_settle_ms() -> u64 {
    3000
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            whitelist: default_whitelist(),
            chrome_path: None,
            headless: default_headless(),
            answer_wait_secs: default_answer_wait_secs(),
            check_interval_secs: default_check_interval_secs(),
            daily_verify_at: default_daily_verify_at(),
            hourly_clear_at: default_hourly_clear_at(),
            retry_backoff_ms: default_retry_backoff_ms(),
            login_settle_ms: default_login_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            log_dir: None,
        }
    }
}

// A senha nunca aparece em logs.
impl fmt::Debug for KeeperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeeperConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("whitelist", &self.whitelist)
            .field("chrome_path", &self.chrome_path)
            .field("headless", &self.headless)
            .field("answer_wait_secs", &self.answer_wait_secs)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("daily_verify_at", &self.daily_verify_at)
            .field("hourly_clear_at", &self.hourly_clear_at)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("login_settle_ms", &self.login_settle_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl KeeperConfig {
    /// Carrega a configuração de `path`, ou de `webrtc-keeper.toml` no diretório
    /// atual. Usa valores padrão se o arquivo padrão não existir; um arquivo
    /// pedido explicitamente precisa existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} not found", path.display());
                }
                Self::from_file(path)?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str::<KeeperConfig>(&contents).map_err(KeeperError::from)?;
        Ok(config)
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 3] = [
            ("WEBRTC_BASE_URL", &mut self.base_url),
            ("WEBRTC_USERNAME", &mut self.username),
            ("WEBRTC_PASSWORD", &mut self.password),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key)
                && !value.is_empty()
            {
                *field = value;
            }
        }
    }

    /// Valida a configuração antes de qualquer sessão ser aberta.
    pub fn validate(&self) -> Result<Settings, KeeperError> {
        let base_url = self.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(KeeperError::Config(
                "base URL is missing (set base_url or WEBRTC_BASE_URL)".into(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(KeeperError::Config(format!(
                "base URL must start with http:// or https://, got {base_url:?}"
            )));
        }
        if self.username.trim().is_empty() {
            return Err(KeeperError::Config(
                "username is missing (set username or WEBRTC_USERNAME)".into(),
            ));
        }
        if self.password.is_empty() {
            return Err(KeeperError::Config(
                "password is missing (set password or WEBRTC_PASSWORD)".into(),
            ));
        }
        if self.answer_wait_secs > MAX_ANSWER_WAIT_SECS {
            return Err(KeeperError::Config(format!(
                "answer_wait_secs must be at most {MAX_ANSWER_WAIT_SECS}, got {}",
                self.answer_wait_secs
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(KeeperError::Config("poll_interval_ms must be positive".into()));
        }

        Ok(Settings {
            credentials: Arc::new(Credentials::new(
                base_url.to_string(),
                self.username.trim().to_string(),
                self.password.clone(),
            )),
            whitelist: self.whitelist.iter().collect(),
            chrome_path: self.chrome_path.clone(),
            headless: self.headless,
            answer_wait: Duration::from_secs(self.answer_wait_secs),
            check_every: Cadence::every(Duration::from_secs(self.check_interval_secs))?,
            daily_verify: Cadence::daily_at(&self.daily_verify_at)?,
            hourly_clear: Cadence::hourly_at(&self.hourly_clear_at)?,
            timing: KeeperTiming {
                retry_backoff: Duration::from_millis(self.retry_backoff_ms),
                login_settle: Duration::from_millis(self.login_settle_ms),
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        })
    }
}

/// Credenciais imutáveis do painel.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(base_url: String, username: String, password: String) -> Self {
        Self {
            base_url,
            username,
            password,
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuração validada, pronta para montar o daemon.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Arc<Credentials>,
    pub whitelist: Whitelist,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub answer_wait: Duration,
    pub check_every: Cadence,
    pub daily_verify: Cadence,
    pub hourly_clear: Cadence,
    pub timing: KeeperTiming,
    pub poll_interval: Duration,
}
