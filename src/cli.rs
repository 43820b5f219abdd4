// ABOUTME: Command-line surface: positional command plus connection and behavior flags
// ABOUTME: Converts parsed flags into the highest-precedence configuration fragment

use crate::config::ConfigFragment;
use clap::Parser;
use std::path::PathBuf;

const COMMANDS_HELP: &str = "\
Commands:
  migrate   Migrate the schema to the latest version
  clean     Drop all objects in the keyspace
  info      Print the details about all the migrations
  validate  Validate the applied migrations against the available ones";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "cassandra-shift-cli", version)]
#[command(about = "Run Cassandra schema migrations: migrate, clean, info, validate", long_about = None)]
#[command(after_help = COMMANDS_HELP)]
pub struct CliArgs {
    /// Command to run (see Commands below)
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Config file (.toml or .json)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Number of clients
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    pub number_of_clients: Option<i64>,

    /// Contact points (comma-separated host[:port])
    #[arg(short = 'p', long, value_delimiter = ',')]
    pub contact_points: Option<Vec<String>>,

    /// Local data center
    #[arg(short = 'd', long)]
    pub local_data_center: Option<String>,

    /// SSL CA file
    #[arg(short = 'a', long)]
    pub ssl_ca: Option<PathBuf>,

    /// SSL certificate file
    #[arg(short = 't', long)]
    pub ssl_cert: Option<PathBuf>,

    /// SSL key file
    #[arg(short = 'y', long)]
    pub ssl_key: Option<PathBuf>,

    #[arg(short = 'u', long)]
    pub username: Option<String>,

    #[arg(short = 'P', long)]
    pub password: Option<String>,

    #[arg(short = 'k', long)]
    pub keyspace: Option<String>,

    /// Ensure keyspace (creates it if it does not exist). Pass
    /// `--ensure-keyspace=false` to turn it off over the file or environment
    #[arg(
        short = 'e',
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub ensure_keyspace: Option<bool>,

    /// Migrations directory
    #[arg(short = 'D', long)]
    pub directory: Option<PathBuf>,

    /// Migration engine executable
    #[arg(long)]
    pub engine: Option<String>,

    /// Give up on the engine after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl CliArgs {
    /// Fragment holding only the flags that were given.
    ///
    /// Leaving `--ensure-keyspace` off means "not set" rather than `false`,
    /// so the file or environment still decide unless it is given.
    pub fn to_fragment(&self) -> ConfigFragment {
        let mut fragment = ConfigFragment {
            number_of_clients: self.number_of_clients,
            ensure_keyspace: self.ensure_keyspace,
            migrations_directory: self.directory.clone(),
            engine_program: self.engine.clone(),
            timeout_secs: self.timeout,
            ..ConfigFragment::default()
        };

        let cluster = &mut fragment.cluster;
        cluster.contact_points = self.contact_points.as_ref().map(|points| {
            points
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        });
        cluster.local_data_center = self.local_data_center.clone();
        cluster.keyspace = self.keyspace.clone();
        cluster.tls.ca = self.ssl_ca.clone();
        cluster.tls.cert = self.ssl_cert.clone();
        cluster.tls.key = self.ssl_key.clone();
        cluster.auth.username = self.username.clone();
        cluster.auth.password = self.password.clone();

        fragment
    }
}
