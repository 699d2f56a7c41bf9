use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use synapse::commands::{ask, ingest, serve, show_status, suggest};
use synapse::config::{Config, run_interactive_config, show_config};
use synapse::pipeline::DEFAULT_QUESTION_COUNT;

#[derive(Parser)]
#[command(name = "synapse")]
#[command(about = "Chat with your documents: ingest PDFs and ask grounded questions")]
#[command(version)]
struct Cli {
    /// Directory holding the configuration and vector index (default: ~/.synapse)
    #[arg(long, global = true, env = "SYNAPSE_HOME")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start the HTTP API
    Serve {
        /// Address to bind, overriding the configured host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ingest a document (PDF, text or Markdown) into the vector index
    Ingest {
        /// Path of the document
        path: PathBuf,
        /// Name recorded as the document's source (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Ask a question about the ingested documents
    Ask {
        question: String,
    },
    /// Suggest questions to ask about a document
    Suggest {
        /// Path of the document
        path: PathBuf,
        /// Number of questions
        #[arg(long, default_value_t = DEFAULT_QUESTION_COUNT)]
        count: usize,
    },
    /// Show model server and vector index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => Config::default_base_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Serve { host, port } => {
            serve(&base_dir, host, port).await?;
        }
        Commands::Ingest { path, name } => {
            ingest(&base_dir, &path, name).await?;
        }
        Commands::Ask { question } => {
            ask(&base_dir, &question).await?;
        }
        Commands::Suggest { path, count } => {
            suggest(&base_dir, &path, count).await?;
        }
        Commands::Status => {
            show_status(&base_dir).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn status_command() {
        let cli = Cli::try_parse_from(["synapse", "status"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.base_dir, None);
    }

    #[test]
    fn ingest_command_with_name() {
        let cli = Cli::try_parse_from(["synapse", "ingest", "report.pdf", "--name", "Q3 Report"])
            .expect("should parse");

        match cli.command {
            Commands::Ingest { path, name } => {
                assert_eq!(path, PathBuf::from("report.pdf"));
                assert_eq!(name, Some("Q3 Report".to_string()));
            }
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    #[serial]
    fn base_dir_from_environment() {
        // SAFETY: env-touching tests are serialised
        unsafe { env::set_var("SYNAPSE_HOME", "/srv/synapse") };
        let cli = Cli::try_parse_from(["synapse", "status"]);
        unsafe { env::remove_var("SYNAPSE_HOME") };

        let cli = cli.expect("should parse");
        assert_eq!(cli.base_dir, Some(PathBuf::from("/srv/synapse")));
    }

    #[test]
    fn base_dir_is_global() {
        let cli = Cli::try_parse_from(["synapse", "ask", "What is this?", "--base-dir", "/tmp/s"])
            .expect("should parse");

        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/s")));
        match cli.command {
            Commands::Ask { question } => assert_eq!(question, "What is this?"),
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn serve_overrides() {
        let cli = Cli::try_parse_from(["synapse", "serve", "--host", "0.0.0.0", "--port", "9000"])
            .expect("should parse");

        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn suggest_defaults_to_five_questions() {
        let cli = Cli::try_parse_from(["synapse", "suggest", "notes.md"]).expect("should parse");

        match cli.command {
            Commands::Suggest { count, .. } => assert_eq!(count, 5),
            _ => panic!("expected suggest command"),
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["synapse", "config", "--show"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn invalid_command() {
        let err = Cli::try_parse_from(["synapse", "invalid"])
            .err()
            .expect("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn ask_requires_a_question() {
        let err = Cli::try_parse_from(["synapse", "ask"])
            .err()
            .expect("should fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
