#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind LRCP socket on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}
