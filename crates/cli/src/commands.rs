use chrono::{DateTime, Utc};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest the landing area, run the resulting batches and report them
    Run {
        #[arg(long, help = "Keep polling the landing area until interrupted")]
        watch: bool,

        #[arg(long, help = "Print the scan report as JSON")]
        json: bool,
    },
    /// Detect and validate a single local file without moving it
    Validate {
        /// File to check; its path decides the declared channel
        path: String,

        #[arg(long, help = "Reject the file on any record-level issue")]
        strict: bool,
    },
    /// List run records processed within a time range
    Runs {
        #[arg(long, help = "Start of the range (RFC 3339), default 24 hours ago")]
        since: Option<DateTime<Utc>>,

        #[arg(long, help = "End of the range, exclusive (RFC 3339), default now")]
        until: Option<DateTime<Utc>>,

        #[arg(long, help = "Only list attempts of this batch")]
        batch: Option<String>,

        #[arg(long, help = "Print the records as JSON instead of a table")]
        json: bool,
    },
    /// Show one run record in full
    ShowRun {
        /// Run record id
        id: String,
    },
    /// Re-run the files of a run record as the next attempt of its batch
    Replay {
        /// Run record id
        id: String,
    },
    /// List curated customer entities
    Customers {
        #[arg(long, help = "Only show this customer")]
        id: Option<String>,

        #[arg(long, help = "Print the entities as JSON instead of a table")]
        json: bool,
    },
    /// Check that the configured PostgreSQL curated store is reachable
    TestConn {
        #[arg(long, help = "Connection URL; defaults to the configured curated store")]
        url: Option<String>,
    },
}
