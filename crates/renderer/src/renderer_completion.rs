use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{RasterCompletion, RasterDispatcher, TileEvent, TileState, ViewportRenderer};

impl<D: RasterDispatcher> ViewportRenderer<D> {
    /// Applies every finished job without blocking, then dispatches tiles
    /// deferred by a full queue. Returns how many results were committed.
    pub fn pump_completions(&mut self) -> usize {
        let mut committed = 0;
        while let Some(completion) = self.dispatcher.try_completion() {
            if self.apply_completion(completion) {
                committed += 1;
            }
        }
        if self.has_deferred_tiles() {
            self.retry_deferred_tiles();
        }
        committed
    }

    /// Blocks until no job is in flight and no needed tile is deferred, or
    /// `timeout` passes, applying results as they arrive. Returns true when
    /// idle; false on timeout or when deferred tiles cannot be dispatched.
    pub fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.pump_completions();
        loop {
            if self.dispatcher.in_flight() == 0 {
                if !self.has_deferred_tiles() {
                    return true;
                }
                self.retry_deferred_tiles();
                if self.dispatcher.in_flight() == 0 && self.has_deferred_tiles() {
                    return false;
                }
                continue;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.dispatcher.wait_completion(remaining) {
                Some(completion) => {
                    self.apply_completion(completion);
                    if self.has_deferred_tiles() {
                        self.retry_deferred_tiles();
                    }
                }
                None => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Check-then-commit: the result is used only if its key is still needed
    /// and the tile is waiting for exactly this job.
    fn apply_completion(&mut self, completion: RasterCompletion) -> bool {
        let RasterCompletion {
            job_id,
            key,
            bitmap,
        } = completion;
        let stale = match self.tiles.get_mut(&key) {
            Some(TileState::Rendering {
                job_id: expected,
                stale,
            }) if *expected == job_id => stale.take(),
            Some(_) => {
                tracing::debug!(?key, job_id, "dropping superseded tile result");
                return false;
            }
            None => {
                tracing::debug!(?key, job_id, "dropping tile result outside viewport");
                return false;
            }
        };

        match bitmap {
            Some(bitmap) => {
                let bitmap = Arc::new(bitmap);
                self.cache.insert(key, Arc::clone(&bitmap));
                self.tiles.insert(
                    key,
                    TileState::Displayed {
                        bitmap: Arc::clone(&bitmap),
                    },
                );
                self.emit(TileEvent::Ready { key, bitmap });
                true
            }
            None => {
                tracing::debug!(?key, job_id, "tile job produced no bitmap");
                let state = match stale {
                    Some(bitmap) => TileState::Displayed { bitmap },
                    None => TileState::Unrendered,
                };
                self.tiles.insert(key, state);
                false
            }
        }
    }
}
