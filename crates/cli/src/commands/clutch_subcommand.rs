use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum ClutchSubcommand {
    #[command(
        name = "discover",
        long_about = "Paginate the results listings, queueing every discovered match. Offsets \
                      already recorded as complete are skipped, so an interrupted run resumes \
                      at the first unprocessed page."
    )]
    Discover {
        /// Highest listing offset to visit (inclusive).
        #[arg(long)]
        max_offset: Option<u32>,
    },

    #[command(
        name = "overview",
        long_about = "Drain pending match overviews: fetch, archive, parse and persist the \
                      match bundle (match, maps, veto, roster)."
    )]
    Overview {
        /// Batch size for this invocation.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    #[command(
        name = "map-stats",
        long_about = "Drain maps that have a stats page but no player rows yet."
    )]
    MapStats {
        /// Batch size for this invocation.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    #[command(
        name = "perf-economy",
        long_about = "Drain maps whose player rows still miss the performance columns; fetches \
                      both the performance and the economy page per map."
    )]
    PerfEconomy {
        /// Batch size for this invocation.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    #[command(
        name = "run-all",
        long_about = "Run discovery once, then cycle the three match stages until none of them \
                      makes further progress."
    )]
    RunAll,

    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Delete the database file.
    Drop,
    /// Delete the database file and recreate an empty schema.
    Reset,
    /// Print the most recent quarantine entries.
    Quarantine {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}
