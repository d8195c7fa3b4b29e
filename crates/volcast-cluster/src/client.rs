//! The cluster coordinator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec3, Vec4};
use tracing::{debug, info, warn};
use volcast_core::{Brick, FrameImage, TransferFunction, ViewState};
use volcast_net::{Command, NetError, ParticipantProxy, RenderState};
use volcast_partition::{BrickLayout, SpatialPartitionTree};

use crate::barrier::{BarrierError, FrameBarrier};
use crate::compositor::{Compositor, Framebuffer};
use crate::config::{ClusterConfig, ParticipantAddress, PartialFramePolicy};
use crate::error::{ClusterError, Result};
use crate::renderer::{PreviewRenderer, RendererCapabilities};
use crate::slots::ImageSlots;
use crate::worker::{ImageWorkerPool, WorkerEvent};

/// Renderer parameters settable through [`ClusterClient::set_parameter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterType {
    /// Sampling quality, forwarded unchanged.
    Quality,
    /// Interpolation between slices; any non-zero value enables it.
    SliceInterpolation,
    /// Maximum intensity projection mode, truncated to an integer.
    MipMode,
}

/// Outcome of one [`ClusterClient::render`] call.
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    pub frame: u64,
    /// Participants in the order their images were composited.
    pub order: Vec<usize>,
    pub eye: Vec3,
    /// Fresh images composited.
    pub composited: usize,
    /// Older images composited in place of missing ones.
    pub reused: usize,
    /// Participants left out of the frame.
    pub skipped: usize,
    /// Participants evicted for missing the frame timeout.
    pub evicted: Vec<usize>,
    /// Participants whose connection failed during the frame.
    pub lost: Vec<usize>,
    pub elapsed: Duration,
}

/// Coordinates a set of remote participants rendering one volume.
pub struct ClusterClient {
    config: ClusterConfig,
    tree: SpatialPartitionTree,
    proxies: Vec<ParticipantProxy>,
    slots: Arc<ImageSlots>,
    barrier: Arc<FrameBarrier>,
    pool: ImageWorkerPool,
    compositor: Compositor,
    framebuffer: Framebuffer,
    last_images: Vec<Option<Arc<FrameImage>>>,
    frame_index: u64,
    shut_down: bool,
}

impl ClusterClient {
    /// Partition the renderer's volume and bring every participant up.
    ///
    /// Fails before any network activity if the renderer cannot be
    /// distributed or the configuration is unusable. Any connection or
    /// distribution failure aborts the whole setup.
    pub fn connect<R>(config: ClusterConfig, renderer: &R) -> Result<Self>
    where
        R: PreviewRenderer + ?Sized,
    {
        if !renderer.supports_distributed_rendering() {
            return Err(ClusterError::WrongRenderer);
        }
        let depth_images = renderer
            .capabilities()
            .contains(RendererCapabilities::DEPTH_IMAGES);
        config.validate()?;
        let (width, height) = window_dims(config.width, config.height)?;

        let volume = renderer.volume();
        volume.validate()?;
        let extent = volume.extent();
        let participant_count = config.participants.len();
        let tree = match &config.weights {
            Some(weights) => SpatialPartitionTree::build_weighted(extent, weights)?,
            None => SpatialPartitionTree::build(extent, participant_count)?,
        };
        let layout = match config.brick_extent {
            Some(max) => BrickLayout::with_max_extent(max)?,
            None => BrickLayout::single(),
        };
        let distribution = layout.distribution(&tree, volume.frames.max(1))?;
        let current_frame = i32::try_from(volume.current_frame).unwrap_or(i32::MAX);

        let mut proxies: Vec<ParticipantProxy> = Vec::with_capacity(participant_count);
        let mut receivers = Vec::with_capacity(participant_count);
        for (participant, address) in config.participants.iter().enumerate() {
            match connect_participant(participant, address, config.connect_timeout) {
                Ok((proxy, receiver)) => {
                    proxies.push(proxy);
                    receivers.push(receiver);
                }
                Err(source) => {
                    warn!(participant, %address, "Connection failed: {source}");
                    close_all(&mut proxies);
                    return Err(ClusterError::Socket {
                        participant,
                        source,
                    });
                }
            }
        }

        for (participant, lists) in distribution.iter().enumerate() {
            let proxy = &mut proxies[participant];
            if let Err(source) = setup_participant(proxy, width, height, current_frame, lists) {
                close_all(&mut proxies);
                return Err(ClusterError::Socket {
                    participant,
                    source,
                });
            }
            debug!(
                participant,
                time_steps = lists.len(),
                bricks = lists.first().map_or(0, Vec::len),
                "Bricks distributed"
            );
        }

        let slots = Arc::new(ImageSlots::new(participant_count));
        let barrier = Arc::new(FrameBarrier::new(participant_count + 1));
        let spawned = ImageWorkerPool::spawn(receivers, Arc::clone(&slots), Arc::clone(&barrier));
        let pool = match spawned {
            Ok(pool) => pool,
            Err(e) => {
                close_all(&mut proxies);
                return Err(e.into());
            }
        };

        info!(
            depth_images,
            "Cluster ready: {} participants, partition depth {}",
            participant_count,
            tree.depth()
        );

        let framebuffer = if depth_images {
            Framebuffer::with_depth(config.width, config.height)
        } else {
            Framebuffer::new(config.width, config.height)
        };
        Ok(Self {
            compositor: Compositor::new(config.order).with_depth(depth_images),
            framebuffer,
            last_images: vec![None; participant_count],
            config,
            tree,
            proxies,
            slots,
            barrier,
            pool,
            frame_index: 0,
            shut_down: false,
        })
    }

    /// Render one frame from `view` into the framebuffer.
    ///
    /// Broadcasts the camera, waits until every live participant delivered
    /// its image, then composites the images in visibility order.
    /// Participants that miss `frame_timeout` are evicted and handled by the
    /// configured [`PartialFramePolicy`].
    pub fn render(&mut self, view: &ViewState) -> Result<FrameStats> {
        let start = Instant::now();
        self.reap_failures();
        let live = self.live_participants();
        if live.is_empty() {
            return Err(ClusterError::NoParticipants);
        }

        self.frame_index += 1;
        let frame = self.frame_index;
        let camera = Command::matrix(view);
        for &participant in &live {
            if let Err(e) = self.proxies[participant].send(&camera) {
                warn!(participant, frame, "Camera update failed: {e}");
            }
        }

        let evicted = self.await_images(frame)?;
        let lost: Vec<usize> = self
            .reap_failures()
            .into_iter()
            .filter(|p| !evicted.contains(p))
            .collect();

        let eye = view.eye_position();
        let order = self.tree.ordered(eye, self.compositor.order().traversal());
        let policy = self.config.partial_frame_policy;
        let mut stats = FrameStats {
            frame,
            eye,
            ..FrameStats::default()
        };
        let mut images = Vec::with_capacity(order.len());
        let mut missing = Vec::new();

        for &participant in &order {
            if let Some(image) = self.slots.fresh(participant, frame) {
                self.last_images[participant] = Some(Arc::clone(&image));
                images.push(image);
                stats.order.push(participant);
                stats.composited += 1;
                continue;
            }
            missing.push(participant);
            match (policy, &self.last_images[participant]) {
                (PartialFramePolicy::ReuseLastImage, Some(last)) => {
                    images.push(Arc::clone(last));
                    stats.order.push(participant);
                    stats.reused += 1;
                }
                _ => stats.skipped += 1,
            }
        }

        if policy == PartialFramePolicy::Abort && !missing.is_empty() {
            return Err(if evicted.is_empty() {
                ClusterError::ParticipantLost {
                    participant: lost.first().copied().unwrap_or(missing[0]),
                }
            } else {
                ClusterError::FrameTimeout {
                    frame,
                    missing: evicted,
                }
            });
        }

        let compositor = self.compositor;
        compositor.composite(
            &mut self.framebuffer,
            self.config.background,
            images.iter().map(|image| &**image),
        );

        stats.evicted = evicted;
        stats.lost = lost;
        stats.elapsed = start.elapsed();
        debug!(
            frame,
            composited = stats.composited,
            reused = stats.reused,
            skipped = stats.skipped,
            "Frame composited in {:?}",
            stats.elapsed
        );
        Ok(stats)
    }

    /// Meet the workers at the barrier, evicting participants that miss the
    /// frame timeout. Returns the evicted participants.
    fn await_images(&mut self, frame: u64) -> Result<Vec<usize>> {
        match self.barrier.wait_timeout(self.config.frame_timeout) {
            Ok(_) => return Ok(Vec::new()),
            Err(BarrierError::Closed) => return Err(ClusterError::NoParticipants),
            Err(BarrierError::TimedOut) => {}
        }

        let evicted: Vec<usize> = (0..self.proxies.len())
            .filter(|&p| self.pool.is_alive(p) && !self.slots.is_fresh(p, frame))
            .collect();
        for &participant in &evicted {
            warn!(
                participant,
                frame,
                timeout = ?self.config.frame_timeout,
                "Participant missed the frame, evicting"
            );
            self.proxies[participant].close();
        }

        // Closed connections make the evicted workers leave the barrier.
        self.barrier
            .wait()
            .map_err(|_| ClusterError::NoParticipants)?;
        Ok(evicted)
    }

    /// Close the connections of failed workers.
    fn reap_failures(&mut self) -> Vec<usize> {
        let mut failed = Vec::new();
        for event in self.pool.drain_events() {
            let WorkerEvent::Failed { participant, error } = event;
            if let Some(proxy) = self.proxies.get_mut(participant) {
                if proxy.is_connected() {
                    warn!(participant, "Participant lost: {error}");
                    proxy.close();
                }
            }
            failed.push(participant);
        }
        failed
    }

    /// Send `command` to every live participant.
    ///
    /// All participants are attempted; the first failure is returned.
    fn broadcast(&mut self, command: &Command) -> Result<()> {
        let mut first_error = None;
        for proxy in self.proxies.iter_mut().filter(|p| p.is_connected()) {
            if let Err(source) = proxy.send(command) {
                first_error.get_or_insert(ClusterError::Socket {
                    participant: proxy.participant(),
                    source,
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Resize the framebuffer and every participant's window.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let (w, h) = window_dims(width, height)?;
        self.config.width = width;
        self.config.height = height;
        self.framebuffer.resize(width, height);
        self.broadcast(&Command::Resize {
            width: w,
            height: h,
        })
    }

    /// Select the time step to render.
    pub fn set_current_frame(&mut self, frame: i32) -> Result<()> {
        self.broadcast(&Command::CurrentFrame(frame))
    }

    pub fn set_mip_mode(&mut self, mode: i32) -> Result<()> {
        self.broadcast(&Command::MipMode(mode))
    }

    pub fn set_object_direction(&mut self, direction: Vec3) -> Result<()> {
        self.broadcast(&Command::ObjectDirection(direction))
    }

    pub fn set_viewing_direction(&mut self, direction: Vec3) -> Result<()> {
        self.broadcast(&Command::ViewingDirection(direction))
    }

    pub fn set_position(&mut self, position: Vec3) -> Result<()> {
        self.broadcast(&Command::Position(position))
    }

    /// Enable or disable the region of interest.
    pub fn set_roi_enabled(&mut self, enabled: bool) -> Result<()> {
        self.broadcast(&Command::ToggleRoi(enabled))
    }

    /// Move the region of interest.
    pub fn set_probe_position(&mut self, position: Vec3) -> Result<()> {
        self.broadcast(&Command::RoiPosition(position))
    }

    pub fn set_probe_size(&mut self, size: Vec3) -> Result<()> {
        self.broadcast(&Command::RoiSize(size))
    }

    pub fn toggle_bounding_box(&mut self) -> Result<()> {
        self.broadcast(&Command::ToggleBoundingBox)
    }

    pub fn update_transfer_function(&mut self, tf: &TransferFunction) -> Result<()> {
        self.broadcast(&Command::TransferFunction(tf.clone()))
    }

    pub fn adjust_quality(&mut self, quality: f32) -> Result<()> {
        self.broadcast(&Command::Quality(quality))
    }

    pub fn set_interpolation(&mut self, enabled: bool) -> Result<()> {
        self.broadcast(&Command::Interpolation(enabled))
    }

    pub fn set_parameter(&mut self, parameter: ParameterType, value: f32) -> Result<()> {
        match parameter {
            ParameterType::Quality => self.adjust_quality(value),
            ParameterType::SliceInterpolation => self.set_interpolation(value != 0.0),
            ParameterType::MipMode => self.set_mip_mode(value as i32),
        }
    }

    /// Tell every participant to exit and join the workers. Idempotent.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.pool.request_shutdown();

        let mut first_error = None;
        for proxy in &mut self.proxies {
            let participant = proxy.participant();
            if let Err(source) = proxy.exit() {
                warn!(participant, "Exit failed: {source}");
                first_error.get_or_insert(ClusterError::Socket {
                    participant,
                    source,
                });
            }
        }
        self.pool.shutdown();
        info!("Cluster shut down after {} frames", self.frame_index);
        first_error.map_or(Ok(()), Err)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn tree(&self) -> &SpatialPartitionTree {
        &self.tree
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn participant_count(&self) -> usize {
        self.proxies.len()
    }

    /// Participants still connected, in index order.
    pub fn live_participants(&self) -> Vec<usize> {
        self.proxies
            .iter()
            .enumerate()
            .filter(|(i, p)| p.is_connected() && self.pool.is_alive(*i))
            .map(|(i, _)| i)
            .collect()
    }

    /// Parameters participant `participant` last accepted.
    pub fn participant_state(&self, participant: usize) -> Option<&RenderState> {
        self.proxies.get(participant).map(ParticipantProxy::state)
    }

    /// Frames rendered so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn background(&self) -> Vec4 {
        self.config.background
    }

    /// Premultiplied background used from the next frame on.
    pub fn set_background(&mut self, background: Vec4) {
        self.config.background = background;
    }
}

impl Drop for ClusterClient {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            debug!("Shutdown on drop: {e}");
        }
    }
}

fn connect_participant(
    participant: usize,
    address: &ParticipantAddress,
    timeout: Duration,
) -> std::result::Result<(ParticipantProxy, volcast_net::ImageReceiver), NetError> {
    let addr = address.resolve()?;
    volcast_net::connect(participant, addr, timeout)
}

fn setup_participant(
    proxy: &mut ParticipantProxy,
    width: i32,
    height: i32,
    current_frame: i32,
    lists: &[Vec<Brick>],
) -> volcast_net::Result<()> {
    proxy.send(&Command::Resize { width, height })?;
    proxy.send(&Command::CurrentFrame(current_frame))?;
    for bricks in lists {
        proxy.put_bricks(bricks)?;
    }
    Ok(())
}

fn close_all(proxies: &mut [ParticipantProxy]) {
    for proxy in proxies {
        proxy.close();
    }
}

fn window_dims(width: u32, height: u32) -> Result<(i32, i32)> {
    match (i32::try_from(width), i32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(ClusterError::InvalidConfiguration(format!(
            "window size {width}x{height} is out of range"
        ))),
    }
}
