use clap::{Parser, Subcommand};

/// Top-level parser for the `creel` binary.
#[derive(Debug, Parser)]
#[command(name = "creel", version, about = "Follow RSS feeds and browse their latest posts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a user and log in as them
    Register {
        name: String,
    },
    /// Switch the session to an existing user
    Login {
        name: String,
    },
    /// List all users
    Users,
    /// Delete every user, along with their feeds, follows, and posts
    Reset,
    /// Add a feed and start following it
    #[command(name = "addfeed")]
    AddFeed {
        name: String,
        url: String,
    },
    /// List every feed and who added it
    Feeds,
    /// Follow an existing feed by URL
    Follow {
        url: String,
    },
    /// List the feeds the current user follows
    Following,
    /// Stop following a feed by URL
    Unfollow {
        url: String,
    },
    /// Show the newest posts from followed feeds
    Browse {
        /// Maximum number of posts to show
        #[arg(default_value_t = 2)]
        limit: i64,
    },
    /// Poll feeds continuously, one feed per cycle
    Agg {
        /// Time between cycles, e.g. 500ms, 30s, 5m, 1h
        interval: String,
        /// Wait out an in-flight cycle instead of letting cycles overlap
        #[arg(long)]
        no_overlap: bool,
    },
}
