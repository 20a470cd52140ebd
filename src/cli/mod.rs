//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Black-box discovery harness for the QA test API
#[derive(Parser, Debug)]
#[command(name = "api-discovery")]
#[command(version)]
#[command(about = "Probe an HTTP API and record how it actually behaves")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the service (overrides BASE_URL and the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Disable TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Console log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run probes against the service
    Run(RunArgs),

    /// List available probes
    List(ListArgs),

    /// Download and inspect the OpenAPI schema
    Schema(SchemaArgs),

    /// Exercise the auth endpoints
    Auth(AuthArgs),

    /// Check service health
    Health,

    /// Inspect and clean up log files
    Logs(LogsArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Probe number to run (1-47), repeatable
    #[arg(short, long = "probe")]
    pub probes: Vec<u8>,

    /// Run every probe in a category (health, schema, functional, discovery,
    /// performance, reliability, security, regression)
    #[arg(long)]
    pub category: Option<String>,

    /// Include probes that sleep for minutes
    #[arg(long)]
    pub include_slow: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Save results to file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show known issues per probe
    #[arg(short, long)]
    pub detailed: bool,
}

#[derive(Parser, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub action: SchemaAction,
}

#[derive(Subcommand, Debug)]
pub enum SchemaAction {
    /// Download the schema into the cache
    Download {
        /// Replace an existing cached copy
        #[arg(short, long)]
        force: bool,
    },

    /// List test endpoints documented in the schema
    Endpoints,

    /// Print the operation object for one path
    Show {
        /// Path as documented, e.g. /api/test/1
        path: String,

        /// HTTP method
        #[arg(short, long, default_value = "get")]
        method: String,
    },
}

#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Exchange the configured refresh token for an access token
    Generate,

    /// Rotate a refresh token
    Refresh {
        /// Refresh token to rotate
        token: String,
    },
}

#[derive(Parser, Debug)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub action: LogsAction,
}

#[derive(Subcommand, Debug)]
pub enum LogsAction {
    /// Show log directory statistics
    Stats,

    /// Delete every log file
    Purge,

    /// Delete main and error logs, keep session logs
    Clear,

    /// Delete session logs older than the given age
    PurgeOld {
        /// Age in days
        #[arg(short, long, default_value = "7")]
        days: u64,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show,

    /// Write an example configuration file
    Init {
        /// Destination file
        #[arg(short, long, default_value = "api-discovery.yaml")]
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["api-discovery", "list", "--detailed"]);
        match args.command {
            Command::List(list_args) => {
                assert!(list_args.detailed);
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "api-discovery",
            "run",
            "--probe",
            "3",
            "-p",
            "12",
            "--include-slow",
            "--format",
            "json",
            "--base-url",
            "http://localhost:8080",
        ]);
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:8080"));
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.probes, vec![3, 12]);
                assert!(run.include_slow);
                assert_eq!(run.format, "json");
                assert!(run.category.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_defaults() {
        let args = Args::parse_from(["api-discovery", "run", "--category", "security"]);
        assert!(!args.insecure);
        match args.command {
            Command::Run(run) => {
                assert!(run.probes.is_empty());
                assert_eq!(run.category.as_deref(), Some("security"));
                assert_eq!(run.format, "table");
                assert!(!run.include_slow);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_schema_show() {
        let args = Args::parse_from(["api-discovery", "schema", "show", "/api/test/1"]);
        match args.command {
            Command::Schema(SchemaArgs {
                action: SchemaAction::Show { path, method },
            }) => {
                assert_eq!(path, "/api/test/1");
                assert_eq!(method, "get");
            }
            _ => panic!("Expected schema show"),
        }
    }

    #[test]
    fn test_logs_purge_old_default() {
        let args = Args::parse_from(["api-discovery", "--insecure", "logs", "purge-old"]);
        assert!(args.insecure);
        match args.command {
            Command::Logs(LogsArgs {
                action: LogsAction::PurgeOld { days },
            }) => assert_eq!(days, 7),
            _ => panic!("Expected logs purge-old"),
        }
    }

    #[test]
    fn test_auth_refresh() {
        let args = Args::parse_from(["api-discovery", "auth", "refresh", "rt-1"]);
        match args.command {
            Command::Auth(AuthArgs {
                action: AuthAction::Refresh { token },
            }) => assert_eq!(token, "rt-1"),
            _ => panic!("Expected auth refresh"),
        }
    }
}
