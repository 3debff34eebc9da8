//! `apidocs` command line: ingest documentation snippets into the local store
//! and run hybrid searches against it.

pub mod config;
mod docs_cmd;

pub use config::AppConfig;
pub use docs_cmd::{Cli, DocsCommand, IngestArgs, SearchArgs};
