//! The aggregation core: a polling scheduler and the
//! select → mark → fetch → parse → store cycle it drives.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::db::{Database, Feed, NewPost, StoreError};
use crate::fetch::{FeedClient, FetchError};
use crate::rss::{self, InvalidFeedError};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid interval `{0}`: expected a whole number with a ms, s, m or h suffix (e.g. 1s, 5m)")]
pub struct InvalidDuration(pub String);

/// Parse an interval like `500ms`, `30s`, `5m`, or `2h`. Units are
/// case-sensitive; no sign, no fraction.
pub fn parse_interval(input: &str) -> Result<Duration, InvalidDuration> {
    let pattern = Regex::new(r"^(\d+)(ms|s|m|h)$").expect("interval pattern compiles");
    let invalid = || InvalidDuration(input.to_string());

    let captures = pattern.captures(input).ok_or_else(invalid)?;
    let value: u64 = captures[1].parse().map_err(|_| invalid())?;
    let unit_ms: u64 = match &captures[2] {
        "ms" => 1,
        "s" => 1000,
        "m" => 60_000,
        "h" => 3_600_000,
        _ => unreachable!("pattern only admits known units"),
    };

    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

/// When a cycle stamps the selected feed's last-fetch time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMarkPolicy {
    /// Stamp before fetching. A feed whose fetch keeps failing still rotates
    /// to the back of the queue; the price is that a failed fetch is not
    /// retried until the feed's next turn comes around.
    #[default]
    Optimistic,
}

/// What happens when a cycle is still running as the next tick fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Cycles run on the timer's schedule even while an earlier one is in
    /// flight. Selection re-reads the most-due feed each time, so concurrent
    /// cycles at worst pick the same feed twice and the later insert pass
    /// stops on URL conflicts.
    #[default]
    Allow,
    /// Skip ticks while a cycle is in flight.
    SkipWhileRunning,
}

enum Message {
    Shutdown,
}

/// Handle for stopping a running [`Aggregator`].
pub struct AggregatorHandle {
    sender: mpsc::Sender<Message>,
    task: JoinHandle<()>,
}

impl AggregatorHandle {
    /// Stop the timer and wait for the scheduler loop to exit. Cycles already
    /// in flight keep running; they are not awaited.
    pub async fn shutdown(self) {
        let _ = self.sender.send(Message::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Periodic feed aggregator. Owns its timer and shutdown channel; runs one
/// cycle immediately on start, then one per period measured from schedule
/// points, not from cycle completion.
pub struct Aggregator {
    db: Arc<Database>,
    client: Arc<FeedClient>,
    period: Duration,
    mark_policy: FetchMarkPolicy,
    overlap: OverlapPolicy,
    receiver: mpsc::Receiver<Message>,
    gate: Arc<Mutex<()>>,
}

impl Aggregator {
    pub fn spawn(
        db: Arc<Database>,
        client: Arc<FeedClient>,
        period: Duration,
        mark_policy: FetchMarkPolicy,
        overlap: OverlapPolicy,
    ) -> AggregatorHandle {
        let (sender, receiver) = mpsc::channel(8);

        let aggregator = Aggregator {
            db,
            client,
            period,
            mark_policy,
            overlap,
            receiver,
            gate: Arc::new(Mutex::new(())),
        };
        let task = tokio::spawn(aggregator.run());

        AggregatorHandle { sender, task }
    }

    async fn run(mut self) {
        // The first tick completes immediately.
        let mut timer = tokio::time::interval(self.period);

        loop {
            tokio::select! {
                _ = timer.tick() => self.start_cycle(),
                msg = self.receiver.recv() => match msg {
                    Some(Message::Shutdown) | None => {
                        info!("aggregator stopped");
                        break;
                    }
                },
            }
        }
    }

    /// Launch one cycle as its own task so a slow feed cannot hold up the
    /// timer.
    fn start_cycle(&self) {
        let permit: Option<OwnedMutexGuard<()>> = match self.overlap {
            OverlapPolicy::Allow => None,
            OverlapPolicy::SkipWhileRunning => match self.gate.clone().try_lock_owned() {
                Ok(guard) => Some(guard),
                Err(_) => {
                    info!("previous cycle still in flight, skipping this tick");
                    return;
                }
            },
        };

        let db = self.db.clone();
        let client = self.client.clone();
        let mark_policy = self.mark_policy;
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = run_cycle(&db, &client, mark_policy).await {
                error!(error = %e, "feed collection cycle failed");
            }
        });
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("parsing feed at {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: InvalidFeedError,
    },
    #[error("storing post {url}: {source}")]
    Store {
        url: String,
        #[source]
        source: StoreError,
    },
}

/// One aggregation cycle: pick the most-due feed, stamp it, then ingest it.
///
/// Fetch, parse, and per-item failures are logged and recovered here; they
/// never stop the scheduler. Only a failure of the store itself propagates.
pub async fn run_cycle(
    db: &Database,
    client: &FeedClient,
    mark_policy: FetchMarkPolicy,
) -> Result<(), StoreError> {
    let Some(feed) = db.select_most_due_feed().await? else {
        info!("no feeds to collect");
        return Ok(());
    };

    info!(feed = %feed.name, url = %feed.url, "collecting feed");

    match mark_policy {
        FetchMarkPolicy::Optimistic => db.mark_feed_fetched(feed.id, Utc::now()).await?,
    }

    match ingest_feed(db, client, &feed).await {
        Ok(stored) => info!(feed = %feed.name, stored, "feed collected"),
        Err(e) => {
            error!(feed = %feed.name, feed_id = feed.id, error = %e, "feed collection failed")
        }
    }

    Ok(())
}

/// Fetch, parse, and store one feed's items, in document order.
///
/// Returns how many posts were stored. Any insert failure (a duplicate post
/// URL, typically) abandons the remaining items for this cycle; earlier
/// inserts stand.
pub async fn ingest_feed(
    db: &Database,
    client: &FeedClient,
    feed: &Feed,
) -> Result<usize, CycleError> {
    let body = client.fetch(&feed.url).await.map_err(|source| CycleError::Fetch {
        url: feed.url.clone(),
        source,
    })?;

    let channel = rss::parse_channel(&body).map_err(|source| CycleError::Parse {
        url: feed.url.clone(),
        source,
    })?;

    let mut stored = 0;
    for item in &channel.items {
        let published_at = parse_pub_date(&item.pub_date);
        if published_at.is_none() {
            warn!(feed = %feed.name, post = %item.link, raw = %item.pub_date,
                "unparseable publish date, storing post without one");
        }

        db.insert_post(NewPost {
            title: &item.title,
            url: &item.link,
            description: Some(&item.description),
            published_at,
            feed_id: feed.id,
        })
        .await
        .map_err(|source| CycleError::Store {
            url: item.link.clone(),
            source,
        })?;

        stored += 1;
    }

    Ok(stored)
}

/// RSS publish dates are nominally RFC 2822, but RFC 3339 shows up in the
/// wild often enough to be worth a second try.
fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
