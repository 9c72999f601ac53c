//! CLI argument definitions.

use clap::Parser;

use crate::config::ConfigFile;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run one query against any supported database, chosen by URI scheme",
    long_about = None
)]
pub struct Args {
    /// Connection URI (postgres://, postgresql://, mysql://, mongodb://, sqlite://, redis://)
    #[arg(short, long)]
    pub uri: Option<String>,

    /// MongoDB collection to query
    #[arg(short, long)]
    pub collection: Option<String>,

    /// Maximum number of MongoDB documents to return [default: 50]
    #[arg(short, long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// SQL statement, MongoDB JSON filter, or Redis command line
    pub query: String,
}

impl Args {
    /// The command-line layer of the configuration.
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            uri: self.uri.clone(),
            collection: self.collection.clone(),
            limit: self.limit,
        }
    }
}
