//! Core data types and I/O operations.

pub mod discovery;
pub mod loaders;
pub mod writers;

pub use discovery::{discover, DiscoveryError, ExtensionFilter, ExtensionMatch, FileSet};
pub use loaders::{load_signal_file, parse_signal, LineOutcome, ParsedSignal, SkipReason};
pub use writers::{write_signal_csv, WriteError};
