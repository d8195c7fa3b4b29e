//! Image retrieval worker pool.
//!
//! One OS thread per participant blocks on that participant's connection,
//! stores each received image in the participant's slot and then meets the
//! coordinator at the frame barrier.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, warn};
use volcast_net::{ConnectionHandle, ImageReceiver, NetError};

use crate::barrier::FrameBarrier;
use crate::slots::ImageSlots;

/// Reported by a worker before it exits abnormally.
#[derive(Debug)]
pub enum WorkerEvent {
    Failed { participant: usize, error: NetError },
}

struct Worker {
    alive: Arc<AtomicBool>,
    connection: Option<ConnectionHandle>,
    thread: Option<JoinHandle<()>>,
}

/// Owns the worker threads, and with them the last references to the
/// barrier and the slots they use.
pub struct ImageWorkerPool {
    workers: Vec<Worker>,
    events: Receiver<WorkerEvent>,
    shutdown: Arc<AtomicBool>,
    barrier: Arc<FrameBarrier>,
}

impl ImageWorkerPool {
    /// Start one worker per receiver. Receiver `i` must belong to
    /// participant `i`.
    pub fn spawn<R>(
        receivers: Vec<ImageReceiver<R>>,
        slots: Arc<ImageSlots>,
        barrier: Arc<FrameBarrier>,
    ) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (event_tx, events) = channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            workers: Vec::with_capacity(receivers.len()),
            events,
            shutdown,
            barrier,
        };

        for receiver in receivers {
            let participant = receiver.participant();
            let alive = Arc::new(AtomicBool::new(true));
            let connection = receiver.shutdown_handle();
            let context = WorkerContext {
                participant,
                slots: Arc::clone(&slots),
                barrier: Arc::clone(&pool.barrier),
                shutdown: Arc::clone(&pool.shutdown),
                alive: Arc::clone(&alive),
                events: event_tx.clone(),
            };

            // On failure the pool drops here and joins what was started.
            let thread = thread::Builder::new()
                .name(format!("image-worker-{participant}"))
                .spawn(move || context.run(receiver))?;

            pool.workers.push(Worker {
                alive,
                connection,
                thread: Some(thread),
            });
        }
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// True while worker `participant` is still receiving.
    pub fn is_alive(&self, participant: usize) -> bool {
        self.workers
            .get(participant)
            .is_some_and(|w| w.alive.load(Ordering::Acquire))
    }

    pub fn live_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.alive.load(Ordering::Acquire))
            .count()
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Failure events reported since the last call.
    pub fn drain_events(&self) -> Vec<WorkerEvent> {
        self.events.try_iter().collect()
    }

    pub fn barrier(&self) -> &Arc<FrameBarrier> {
        &self.barrier
    }

    /// Mark the pool as stopping so that closed connections are not
    /// reported as failures.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Stop and join every worker.
    ///
    /// Connections are closed before the barrier so workers blocked on a
    /// receive wake up before those blocked on the barrier.
    pub fn shutdown(&mut self) {
        self.request_shutdown();
        for worker in &self.workers {
            if let Some(connection) = &worker.connection {
                connection.close();
            }
        }
        self.barrier.close();

        for (participant, worker) in self.workers.iter_mut().enumerate() {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!(participant, "Image worker panicked");
                }
            }
        }
    }
}

impl Drop for ImageWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct WorkerContext {
    participant: usize,
    slots: Arc<ImageSlots>,
    barrier: Arc<FrameBarrier>,
    shutdown: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    events: Sender<WorkerEvent>,
}

impl WorkerContext {
    fn run<R: Read>(self, mut receiver: ImageReceiver<R>) {
        // Counts delivered images; matches the coordinator's frame index for
        // as long as the participant receives every camera update.
        let mut frame = 0u64;
        loop {
            match receiver.get_image() {
                Ok(image) => {
                    frame += 1;
                    self.slots.store(self.participant, frame, image);
                }
                Err(error) => {
                    self.fail(error);
                    return;
                }
            }

            if self.barrier.wait().is_err() {
                debug!(participant = self.participant, "Barrier closed, worker exiting");
                self.alive.store(false, Ordering::Release);
                return;
            }
        }
    }

    fn fail(&self, error: NetError) {
        self.alive.store(false, Ordering::Release);
        if self.shutdown.load(Ordering::Acquire) {
            debug!(participant = self.participant, "Worker stopped");
        } else {
            warn!(participant = self.participant, "Image retrieval failed: {error}");
            // The coordinator may already be gone.
            let _ = self.events.send(WorkerEvent::Failed {
                participant: self.participant,
                error,
            });
        }
        self.barrier.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;
    use volcast_core::{FrameImage, ScreenRect};
    use volcast_net::{MessageReader, MessageWriter};

    fn receiver_with_images(participant: usize, count: usize) -> ImageReceiver<Cursor<Vec<u8>>> {
        let mut writer = MessageWriter::new(Vec::new());
        for i in 0..count {
            let image = FrameImage::filled(9, ScreenRect::new(0, 0, 1, 1), [i as u8; 4]);
            writer.put_image(&image).unwrap();
        }
        let bytes = Cursor::new(writer.into_inner());
        ImageReceiver::from_reader(participant, MessageReader::new(bytes))
    }

    #[test]
    fn workers_deliver_then_report_end_of_stream() {
        let slots = Arc::new(ImageSlots::new(2));
        let barrier = Arc::new(FrameBarrier::new(3));
        let pool = ImageWorkerPool::spawn(
            vec![receiver_with_images(0, 2), receiver_with_images(1, 1)],
            Arc::clone(&slots),
            Arc::clone(&barrier),
        )
        .unwrap();

        // Frame 1: both deliver. Worker 0 may already hold its second image.
        barrier.wait_timeout(Duration::from_secs(5)).unwrap();
        assert!(slots.get(0).is_some());
        assert!(slots.is_fresh(1, 1));
        assert_eq!(slots.fresh(1, 1).unwrap().participant, 1);

        // Frame 2: participant 1's stream ends and it leaves the barrier.
        barrier.wait_timeout(Duration::from_secs(5)).unwrap();
        assert!(slots.is_fresh(0, 2));
        assert!(!slots.is_fresh(1, 2));

        let events = pool.events().recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            events,
            WorkerEvent::Failed {
                participant: 1,
                error: NetError::Closed
            }
        ));
        assert!(!pool.is_alive(1));
    }

    #[test]
    fn shutdown_is_quiet_and_joins() {
        let slots = Arc::new(ImageSlots::new(1));
        let barrier = Arc::new(FrameBarrier::new(2));
        let mut pool =
            ImageWorkerPool::spawn(vec![receiver_with_images(0, 1)], slots, Arc::clone(&barrier))
                .unwrap();
        // The worker is parked on the barrier after its only image.
        thread::sleep(Duration::from_millis(20));
        pool.shutdown();
        assert_eq!(pool.live_count(), 0);
        assert!(pool.drain_events().is_empty());
        assert!(barrier.is_closed());
    }
}
