use thiserror::Error;

/// Fallos del resolvedor de pistas.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no se encontraron resultados para `{0}`")]
    NotFound(String),

    #[error("contenido restringido o no disponible: {0}")]
    Restricted(String),

    #[error("yt-dlp falló: {0}")]
    Extraction(String),

    #[error("la búsqueda superó el tiempo límite de {0}s")]
    Timeout(u64),

    #[error("no se pudo ejecutar yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Fallos del sink de audio al iniciar o controlar una pista.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no hay conexión de voz activa")]
    Disconnected,

    #[error("error de control de pista: {0}")]
    Control(String),
}

/// Fallos de una operación `play`.
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("el bot no está conectado a un canal de voz en este servidor")]
    NotConnected,

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
