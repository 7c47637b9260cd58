use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::core::Role;
use crate::offline::ItemKind;

#[derive(Parser)]
#[command(name = "glas-offline")]
#[command(about = "Offline write queue for field technicians")]
#[command(long_about = "glas-offline - offline write queue for field technicians

Writes made without connectivity (task status, notes, measurements,
checklist ticks, photos, signatures) are stored locally and replayed
against the backend once it is reachable again.

QUICK START:
  glas-offline --org ORG enqueue task-status --task t1 --status done
  glas-offline status             Pending items and connectivity
  glas-offline --org ORG sync     Probe the backend and replay the queue

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

LOGGING:
  Logs go to stderr. Use -v for info, -vv for debug, or set GLAS_LOG.")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Defaults to `general.default_output` from config.yaml.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Data directory holding config.yaml and queue.db
    #[arg(long, global = true, env = "GLAS_OFFLINE_HOME")]
    pub data_dir: Option<PathBuf>,

    /// Organization the writes belong to
    #[arg(long, global = true, env = "GLAS_ORG_ID")]
    pub org: Option<String>,

    /// Role of the signed-in user
    #[arg(long, value_enum, global = true, env = "GLAS_ROLE", default_value = "technician")]
    pub role: Role,

    /// Backend base URL (overrides backend.url)
    #[arg(long, global = true, env = "GLAS_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Backend API key (overrides backend.anon_key)
    #[arg(long, global = true, env = "GLAS_ANON_KEY", hide_env_values = true)]
    pub anon_key: Option<String>,

    /// User access token (overrides backend.access_token)
    #[arg(long, global = true, env = "GLAS_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connectivity and queue state
    ///
    /// Probes the backend when one is configured. Pending count includes
    /// dead-lettered items.
    ///
    /// # Examples
    ///
    ///   glas-offline status
    ///   glas-offline status -o json
    #[command(alias = "s")]
    Status,

    /// List queued items, oldest first
    #[command(alias = "ls")]
    List {
        /// Only items that stopped being retried
        #[arg(long)]
        dead: bool,
    },

    /// Queue a write for later replay
    ///
    /// # Examples
    ///
    ///   glas-offline enqueue task-status --task t1 --status done
    ///   glas-offline enqueue photo --work-order wo1 --file raam.jpg --tag voor
    ///   glas-offline enqueue raw --type mutation --table work_tasks --payload '{"id":"t1"}'
    #[command(alias = "q")]
    Enqueue(EnqueueArgs),

    /// Replay the queue against the backend
    ///
    /// Probes the backend first; when it is unreachable nothing is sent and
    /// every item stays queued.
    Sync {
        /// Treat the backend as unreachable without probing
        #[arg(long)]
        offline: bool,
    },

    /// Reset dead-lettered items so sync picks them up again
    Retry {
        /// Item to reset
        #[arg(long, conflicts_with = "all")]
        id: Option<String>,

        /// Reset every dead-lettered item
        #[arg(long)]
        all: bool,
    },

    /// Remove items from the queue without replaying them
    Discard {
        /// Item to remove
        #[arg(long, conflicts_with = "all")]
        id: Option<String>,

        /// Remove every item
        #[arg(long)]
        all: bool,

        /// Required with --all
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct EnqueueArgs {
    #[command(subcommand)]
    pub command: EnqueueCommands,
}

/// Write kinds that can be queued.
#[derive(Subcommand)]
pub enum EnqueueCommands {
    /// Change a task's status
    TaskStatus {
        #[arg(long)]
        task: String,

        /// New status (started, blocked, done)
        #[arg(long)]
        status: String,
    },

    /// Replace a work order's notes
    Notes {
        #[arg(long)]
        work_order: String,

        #[arg(long)]
        notes: String,
    },

    /// Record a window measurement in millimetres
    Measurement {
        #[arg(long)]
        work_order: String,

        #[arg(long)]
        label: String,

        #[arg(long)]
        width: f64,

        #[arg(long)]
        height: f64,
    },

    /// Add or toggle a checklist item
    Checklist {
        #[arg(long)]
        work_order: String,

        #[arg(long)]
        label: String,

        /// Existing item id; omit to create a new item
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        checked: bool,
    },

    /// Attach a photo (queues the upload and its record)
    Photo {
        #[arg(long)]
        work_order: String,

        #[arg(long)]
        file: PathBuf,

        /// Short tag used in the object name and description
        #[arg(long)]
        tag: String,
    },

    /// Attach a signature image (queues the upload and its record)
    Signature {
        #[arg(long)]
        work_order: String,

        /// PNG image of the signature
        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "Klant")]
        signer: String,
    },

    /// Queue an untyped item; the payload is checked only at replay
    Raw {
        #[arg(long = "type", value_enum)]
        kind: ItemKind,

        #[arg(long)]
        table: String,

        /// JSON payload
        #[arg(long)]
        payload: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_output_is_unset() {
        let cli = Cli::try_parse_from(["glas-offline", "status"]).unwrap();
        assert!(cli.output.is_none());
        assert_eq!(cli.role, Role::Technician);
    }

    #[test]
    fn test_cli_output_format_short() {
        let cli = Cli::try_parse_from(["glas-offline", "-o", "json", "status"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_cli_verbose_count() {
        let cli = Cli::try_parse_from(["glas-offline", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "glas-offline",
            "list",
            "--org",
            "org1",
            "--role",
            "viewer",
            "--dead",
        ])
        .unwrap();
        assert_eq!(cli.org.as_deref(), Some("org1"));
        assert_eq!(cli.role, Role::Viewer);
        assert!(matches!(cli.command, Commands::List { dead: true }));
    }

    #[test]
    fn test_cli_enqueue_task_status() {
        let cli = Cli::try_parse_from([
            "glas-offline",
            "enqueue",
            "task-status",
            "--task",
            "t1",
            "--status",
            "done",
        ])
        .unwrap();
        if let Commands::Enqueue(args) = cli.command {
            assert!(matches!(
                args.command,
                EnqueueCommands::TaskStatus { ref task, ref status } if task == "t1" && status == "done"
            ));
        } else {
            panic!("Expected Enqueue command");
        }
    }

    #[test]
    fn test_cli_enqueue_raw_type() {
        let cli = Cli::try_parse_from([
            "glas-offline",
            "enqueue",
            "raw",
            "--type",
            "upload",
            "--table",
            "work_photos",
            "--payload",
            "{}",
        ])
        .unwrap();
        if let Commands::Enqueue(args) = cli.command {
            assert!(matches!(
                args.command,
                EnqueueCommands::Raw { kind: ItemKind::Upload, .. }
            ));
        } else {
            panic!("Expected Enqueue command");
        }
    }

    #[test]
    fn test_cli_measurement_requires_numbers() {
        let result = Cli::try_parse_from([
            "glas-offline",
            "enqueue",
            "measurement",
            "--work-order",
            "wo1",
            "--label",
            "raam",
            "--width",
            "wide",
            "--height",
            "900",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_retry_id_conflicts_with_all() {
        let result = Cli::try_parse_from(["glas-offline", "retry", "--id", "x", "--all"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_sync_offline_flag() {
        let cli = Cli::try_parse_from(["glas-offline", "sync", "--offline"]).unwrap();
        assert!(matches!(cli.command, Commands::Sync { offline: true }));
    }
}
