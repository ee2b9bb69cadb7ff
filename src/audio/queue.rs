use parking_lot::Mutex;
use std::{collections::VecDeque, time::Duration};
use tokio::sync::Notify;
use tracing::debug;

use super::track::Track;
use crate::error::QueueIndexError;

/// Result of a bounded wait on the queue.
#[derive(Debug)]
pub enum Dequeued {
    Track(Track),
    /// Nothing arrived before the deadline. Not an error: the caller decides.
    TimedOut,
}

/// FIFO waiting line of tracks for one guild.
///
/// Every mutation takes the same lock, so concurrent producers, the single
/// consumer, `remove_at` and `clear` are linearizable. Waiting consumers are
/// woken through a [`Notify`]; nothing polls.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    items: Mutex<VecDeque<Track>>,
    available: Notify,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail and returns the 0-based position it landed on.
    pub fn enqueue(&self, track: Track) -> usize {
        let position = {
            let mut items = self.items.lock();
            items.push_back(track);
            items.len() - 1
        };
        self.available.notify_one();
        position
    }

    /// Removes the head, waiting up to `timeout` for one to arrive.
    pub async fn dequeue_blocking(&self, timeout: Duration) -> Dequeued {
        match tokio::time::timeout(timeout, self.dequeue()).await {
            Ok(track) => Dequeued::Track(track),
            Err(_) => Dequeued::TimedOut,
        }
    }

    /// Cancel safe: the pop happens in the same poll that completes the
    /// future, so dropping it never loses a track.
    async fn dequeue(&self) -> Track {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so an enqueue between the check and
            // the await still wakes us.
            notified.as_mut().enable();

            if let Some(track) = self.items.lock().pop_front() {
                return track;
            }

            notified.await;
        }
    }

    /// Snapshot of `[start, end)`, clamped to the current length.
    pub fn peek_range(&self, start: usize, end: usize) -> Vec<Track> {
        range_of(&self.items.lock(), start, end)
    }

    pub fn remove_at(&self, index: usize) -> Result<Track, QueueIndexError> {
        let mut items = self.items.lock();
        let len = items.len();
        let removed = items.remove(index).ok_or(QueueIndexError { index, len })?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(removed)
    }

    /// Empties the queue and returns how many tracks were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// One page of the queue for display; `page` is 1-based.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let start = (page - 1) * per_page;

        // Length and rows come from one lock so the header matches the rows.
        let (total_items, rows) = {
            let items = self.items.lock();
            (items.len(), range_of(&items, start, start + per_page))
        };
        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(offset, track)| (start + offset + 1, track))
            .collect();

        QueuePage {
            entries,
            current_page: page,
            total_pages: total_items.div_ceil(per_page).max(1),
            total_items,
        }
    }
}

/// Clones `[start, end)`, clamped to the length of `items`.
fn range_of(items: &VecDeque<Track>, start: usize, end: usize) -> Vec<Track> {
    let end = end.min(items.len());
    if start >= end {
        return Vec::new();
    }
    items.range(start..end).cloned().collect()
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    /// `(1-based position, track)` pairs.
    pub entries: Vec<(usize, Track)>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}
