//! Handlers behind the CLI subcommands. User-facing output goes through
//! `println!`; operational logging stays on `tracing`.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;

use crate::agg::{self, Aggregator, FetchMarkPolicy, OverlapPolicy};
use crate::config::Config;
use crate::db::{Database, StoreError, User};
use crate::fetch::FeedClient;

/// Look up the session user. Commands that operate on behalf of a user fail
/// early when nobody is logged in.
async fn require_user(config: &Config, db: &Database) -> anyhow::Result<User> {
    let name = config
        .current_user
        .as_deref()
        .context("no user logged in; run `creel login <name>` first")?;
    db.get_user(name)
        .await?
        .with_context(|| format!("user `{name}` no longer exists; run `creel register {name}`"))
}

pub async fn register(config: &mut Config, db: &Database, name: &str) -> anyhow::Result<()> {
    let user = match db.create_user(name).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => bail!("user `{name}` already exists"),
        Err(e) => return Err(e.into()),
    };

    config.set_current_user(&user.name);
    config.save()?;
    println!("User `{}` registered and logged in", user.name);
    Ok(())
}

pub async fn login(config: &mut Config, db: &Database, name: &str) -> anyhow::Result<()> {
    let user = db
        .get_user(name)
        .await?
        .with_context(|| format!("user `{name}` does not exist"))?;

    config.set_current_user(&user.name);
    config.save()?;
    println!("Switched to user `{}`", user.name);
    Ok(())
}

pub async fn users(config: &Config, db: &Database) -> anyhow::Result<()> {
    let current = config.current_user.as_deref();
    for user in db.list_users().await? {
        if current == Some(user.name.as_str()) {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

pub async fn reset(db: &Database) -> anyhow::Result<()> {
    db.reset().await?;
    println!("Database reset");
    Ok(())
}

pub async fn add_feed(
    config: &Config,
    db: &Database,
    name: &str,
    url: &str,
) -> anyhow::Result<()> {
    let user = require_user(config, db).await?;

    let feed = match db.create_feed(name, url, user.id).await {
        Ok(feed) => feed,
        Err(StoreError::Conflict(what)) => bail!("{what}"),
        Err(e) => return Err(e.into()),
    };
    db.create_feed_follow(user.id, feed.id).await?;

    println!("Added feed `{}` ({}), now following it", feed.name, feed.url);
    Ok(())
}

pub async fn feeds(db: &Database) -> anyhow::Result<()> {
    let feeds = db.list_feeds().await?;
    if feeds.is_empty() {
        println!("No feeds yet; add one with `creel addfeed <name> <url>`");
        return Ok(());
    }

    for feed in feeds {
        let creator = feed.creator.as_deref().unwrap_or("(nobody)");
        println!("* {} ({}) added by {}", feed.name, feed.url, creator);
    }
    Ok(())
}

pub async fn follow(config: &Config, db: &Database, url: &str) -> anyhow::Result<()> {
    let user = require_user(config, db).await?;

    let feed = db
        .get_feed_by_url(url)
        .await?
        .with_context(|| format!("no feed at `{url}`; add it with `creel addfeed`"))?;

    match db.create_feed_follow(user.id, feed.id).await {
        Ok(_) => {
            println!("{} is now following `{}`", user.name, feed.name);
            Ok(())
        }
        Err(StoreError::Conflict(_)) => bail!("already following `{}`", feed.name),
        Err(e) => Err(e.into()),
    }
}

pub async fn following(config: &Config, db: &Database) -> anyhow::Result<()> {
    let user = require_user(config, db).await?;

    let follows = db.follows_for_user(user.id).await?;
    if follows.is_empty() {
        println!("Not following any feeds");
        return Ok(());
    }

    println!("Following {} feed(s):", follows.len());
    for name in follows {
        println!("- {name}");
    }
    Ok(())
}

pub async fn unfollow(config: &Config, db: &Database, url: &str) -> anyhow::Result<()> {
    let user = require_user(config, db).await?;

    if !db.delete_feed_follow(user.id, url).await? {
        bail!("not following any feed at `{url}`");
    }
    println!("Unfollowed `{url}`");
    Ok(())
}

pub async fn browse(config: &Config, db: &Database, limit: i64) -> anyhow::Result<()> {
    if limit <= 0 {
        bail!("limit must be a positive number");
    }
    let user = require_user(config, db).await?;

    let posts = db.posts_for_user(user.id, limit).await?;
    if posts.is_empty() {
        println!("No posts found; follow some feeds and run `creel agg`");
        return Ok(());
    }

    for (index, post) in posts.iter().enumerate() {
        println!("{}. {}", index + 1, post.title);
        println!("   URL: {}", post.url);
        println!(
            "   Description: {}",
            post.description.as_deref().unwrap_or("(none)")
        );
        println!(
            "   Published: {}",
            post.published_at.as_deref().unwrap_or("(unknown)")
        );
        println!("   From: {}", post.feed_name);
        println!();
    }
    Ok(())
}

/// Run the aggregation loop until interrupted. A bad interval aborts here,
/// before the scheduler ever starts.
pub async fn agg(db: Arc<Database>, interval: &str, no_overlap: bool) -> anyhow::Result<()> {
    let period = agg::parse_interval(interval)?;
    let overlap = if no_overlap {
        OverlapPolicy::SkipWhileRunning
    } else {
        OverlapPolicy::Allow
    };

    println!("Collecting feeds every {interval} (ctrl-c to stop)");

    let client = Arc::new(FeedClient::new());
    let handle = Aggregator::spawn(db, client, period, FetchMarkPolicy::Optimistic, overlap);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("interrupt received, shutting down");

    handle.shutdown().await;
    println!("Feed aggregation stopped");
    Ok(())
}
