use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shared memory: {0}")]
    Shm(#[from] nix::Error),
    #[error("shared region \"{0}\" is not initialised (is the simulator running?)")]
    RegionUninitialised(String),
    #[error("{0}: {1}")]
    File(String, #[source] io::Error),
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn file(path: impl AsRef<std::path::Path>, e: io::Error) -> Self {
        Error::File(path.as_ref().display().to_string(), e)
    }
}
