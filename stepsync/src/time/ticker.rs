use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::clock::Clock;
use crate::prelude::*;

pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(1);

type TickCallback = Box<dyn FnMut(u64) + Send + 'static>;

/// The clock and its callback live under one lock, so a tick is always
/// delivered before anything else can touch the clock.
struct Shared {
    clock: Clock,
    on_tick: TickCallback,
}

/// Drives a [`Clock`] from a dedicated thread, polling at a fine resolution
/// and reporting each new tick to a callback.
///
/// Stopping (explicitly or on drop) joins the thread, so no callback can
/// fire once [`ClockTicker::stop`] has returned.
pub struct ClockTicker {
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ClockTicker {
    pub fn start<F>(clock: Clock, resolution: Duration, on_tick: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared {
            clock,
            on_tick: Box::new(on_tick),
        }));
        let running = Arc::new(AtomicBool::new(true));
        let resolution = resolution.max(Duration::from_micros(100));

        let handle = {
            let shared = shared.clone();
            let running = running.clone();

            thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    {
                        let mut shared = shared.lock();
                        let Shared { clock, on_tick } = &mut *shared;

                        if let Some(tick) = clock.tick(Instant::now()) {
                            trace!("clock tick {}", tick);
                            on_tick(tick);
                        }
                    }

                    thread::sleep(resolution);
                }

                debug!("clock ticker thread is exiting");
            })
        };

        info!("clock ticker started at {:?} resolution", resolution);

        Self {
            shared,
            running,
            thread_handle: Some(handle),
        }
    }

    /// Re-anchors time zero on the next poll and publishes tick 0 through the
    /// callback, on the calling thread. Every tick computed before the reset
    /// has already been delivered when this runs.
    pub fn reset(&self) -> u64 {
        let mut shared = self.shared.lock();
        let tick = shared.clock.reset();
        (shared.on_tick)(tick);
        tick
    }

    pub fn set_tempo(&self, bpm: f32, division: &str) {
        self.shared.lock().clock.set_tempo(bpm, division);
    }

    pub fn current(&self) -> u64 {
        self.shared.lock().clock.current()
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("clock ticker thread panicked");
            }
        }
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
