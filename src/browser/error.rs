//! Conversão dos erros do `chromiumoxide` para [`RemoteError`].
//!
//! Decide o que é "elemento ausente", "timeout" ou falha de transporte. O
//! Chrome reporta nós inexistentes como erro de protocolo com mensagem, então
//! parte da classificação é feita pelo texto.

use chromiumoxide::error::CdpError;

use crate::remote::RemoteError;

/// Trechos de mensagem do Chrome que significam "o nó não existe (mais)".
const MISSING_NODE_HINTS: [&str; 3] = [
    "could not find node",
    "no node with given id",
    "node is detached",
];

impl From<CdpError> for RemoteError {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::NotFound => RemoteError::NotFound("element not found".into()),
            CdpError::Timeout => RemoteError::Timeout("browser did not answer in time".into()),
            other => classify(other.to_string()),
        }
    }
}

/// Classifica uma mensagem de erro do Chrome.
fn classify(message: String) -> RemoteError {
    let lowered = message.to_lowercase();
    if MISSING_NODE_HINTS.iter().any(|hint| lowered.contains(hint)) {
        RemoteError::NotFound(message)
    } else {
        RemoteError::Transport(message)
    }
}
