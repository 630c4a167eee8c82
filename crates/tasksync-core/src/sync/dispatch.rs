//! Windowed fan-out with a pause between windows.
//!
//! Work is split into fixed-size windows. All items of a window are polled
//! together on the calling task; the next window starts only after the whole
//! window has finished and the pause has elapsed.

use std::future::Future;
use std::time::Duration;

/// Fixed-window rate limiter: at most `size` calls in flight, then a pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindow {
    size: usize,
    pause: Duration,
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }
}

impl FixedWindow {
    /// A `size` of zero is treated as one.
    pub fn new(size: usize, pause: Duration) -> Self {
        Self {
            size: size.max(1),
            pause,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Partition `items` into windows, preserving order.
    pub fn windows<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        items.chunks(self.size)
    }

    /// Sleep for the inter-window pause.
    pub async fn wait(&self) {
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
    }
}

/// Run `work` over every item, window by window.
///
/// Results come back in input order. An `Err` from one item has no effect on
/// its siblings or on later windows.
pub async fn dispatch<'a, T, R, F, Fut>(window: &FixedWindow, items: &'a [T], mut work: F) -> Vec<R>
where
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut results = Vec::with_capacity(items.len());

    for (index, group) in window.windows(items).enumerate() {
        if index > 0 {
            window.wait().await;
        }
        tracing::debug!(window = index + 1, size = group.len(), "dispatching window");
        let outcomes = futures::future::join_all(group.iter().map(&mut work)).await;
        results.extend(outcomes);
    }

    results
}
