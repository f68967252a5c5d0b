//! Opções de inicialização do Chrome.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::BrowserConfig;

use crate::error::KeeperError;

/// Argumentos do Chrome usados pelo daemon: dispositivos de mídia falsos e
/// autoplay liberado para que a chamada possa ser atendida sem interação.
const MEDIA_ARGS: [&str; 3] = [
    "--use-fake-device-for-media-stream",
    "--use-fake-ui-for-media-stream",
    "--autoplay-policy=no-user-gesture-required",
];

/// Tempo máximo de resposta de um comando CDP.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Como abrir o navegador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Executável do Chrome. Sem ele, o `chromiumoxide` procura no PATH.
    pub chrome_path: Option<PathBuf>,
    /// Executa o Chrome sem janela.
    pub headless: bool,
}

impl LaunchOptions {
    /// Argumentos extras passados ao Chrome.
    pub fn chrome_args(&self) -> Vec<&'static str> {
        let mut args = Vec::with_capacity(MEDIA_ARGS.len() + 1);
        if self.headless {
            args.push("--disable-gpu");
        }
        args.extend(MEDIA_ARGS);
        args
    }

    pub fn browser_config(&self) -> Result<BrowserConfig, KeeperError> {
        let mut builder = BrowserConfig::builder().request_timeout(REQUEST_TIMEOUT);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        for arg in self.chrome_args() {
            builder = builder.arg(arg);
        }
        builder.build().map_err(KeeperError::Launch)
    }
}
