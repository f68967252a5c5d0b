//! Interface de linha de comando do webrtc-keeper baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, verify, check)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// webrtc-keeper: mantém um painel WebRTC logado e atende chamadas liberadas.
#[derive(Debug, Parser)]
#[command(name = "webrtc-keeper", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./webrtc-keeper.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Executa o daemon até receber SIGINT ou SIGTERM.
    Run,

    /// Abre uma sessão, garante o login uma vez e sai.
    Verify,

    /// Valida a configuração e mostra o resumo, sem abrir sessão.
    Check {
        /// Também consulta a página de login do painel via HTTP.
        #[arg(long, default_value_t = false)]
        online: bool,
    },
}
