pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::{BuildError, EmbedError, ErrorKind, LedgerError, StorageError};
pub use models::{BuildReport, Chunk, Config, OutputFormat};
