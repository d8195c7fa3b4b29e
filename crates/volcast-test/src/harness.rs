//! Loopback participants and renderer wrappers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use glam::{UVec3, Vec3, Vec4};
use parking_lot::Mutex;
use tracing::debug;
use volcast_cluster::{ClusterConfig, ParticipantAddress};
use volcast_core::{Brick, Camera, Error, FrameImage, ViewState, VolumeDesc};
use volcast_net::RenderState;
use volcast_participant::{
    BrickRenderer, FlatRenderer, ParticipantServer, ServeError, SessionSummary,
};

use crate::{Result, TestError};

/// A 2 x 1 x 1 volume occupying `[0,0,0]-[2,1,1]`.
pub fn test_volume() -> VolumeDesc {
    VolumeDesc::new(UVec3::new(2, 1, 1)).with_position(Vec3::new(1.0, 0.5, 0.5))
}

/// Perspective view from `eye` towards `target` for a square viewport.
pub fn create_test_view(eye: Vec3, target: Vec3) -> ViewState {
    Camera::looking_at(eye, target, 1.0).view_state()
}

/// Delays every image by a fixed amount.
pub struct DelayedRenderer<R> {
    inner: R,
    delay: Duration,
}

impl<R: BrickRenderer> DelayedRenderer<R> {
    pub const fn new(inner: R, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<R: BrickRenderer> BrickRenderer for DelayedRenderer<R> {
    fn render(
        &mut self,
        state: &RenderState,
        view: &ViewState,
        bricks: &[Brick],
    ) -> volcast_core::Result<FrameImage> {
        thread::sleep(self.delay);
        self.inner.render(state, view, bricks)
    }
}

/// Renders normally for a number of frames, then blocks for `stall` on
/// every later frame.
pub struct StallingRenderer<R> {
    inner: R,
    healthy_frames: u64,
    stall: Duration,
    rendered: u64,
}

impl<R: BrickRenderer> StallingRenderer<R> {
    pub const fn new(inner: R, healthy_frames: u64, stall: Duration) -> Self {
        Self {
            inner,
            healthy_frames,
            stall,
            rendered: 0,
        }
    }
}

impl<R: BrickRenderer> BrickRenderer for StallingRenderer<R> {
    fn render(
        &mut self,
        state: &RenderState,
        view: &ViewState,
        bricks: &[Brick],
    ) -> volcast_core::Result<FrameImage> {
        self.rendered += 1;
        if self.rendered > self.healthy_frames {
            thread::sleep(self.stall);
        }
        self.inner.render(state, view, bricks)
    }
}

/// Renders normally for a number of frames, then fails, which ends the
/// participant's session and drops its connection.
pub struct FailingRenderer<R> {
    inner: R,
    healthy_frames: u64,
    rendered: u64,
}

impl<R: BrickRenderer> FailingRenderer<R> {
    pub const fn new(inner: R, healthy_frames: u64) -> Self {
        Self {
            inner,
            healthy_frames,
            rendered: 0,
        }
    }
}

impl<R: BrickRenderer> BrickRenderer for FailingRenderer<R> {
    fn render(
        &mut self,
        state: &RenderState,
        view: &ViewState,
        bricks: &[Brick],
    ) -> volcast_core::Result<FrameImage> {
        self.rendered += 1;
        if self.rendered > self.healthy_frames {
            return Err(Error::InvalidData(format!(
                "injected failure on frame {}",
                self.rendered
            )));
        }
        self.inner.render(state, view, bricks)
    }
}

/// One render call as seen by a participant.
#[derive(Clone, Debug)]
pub struct RenderRecord {
    pub state: RenderState,
    pub bricks: Vec<Brick>,
    pub at: Instant,
}

/// Shared log of render calls.
pub type RenderLog = Arc<Mutex<Vec<RenderRecord>>>;

/// Logs every call before delegating.
pub struct RecordingRenderer<R> {
    inner: R,
    log: RenderLog,
}

impl<R: BrickRenderer> RecordingRenderer<R> {
    pub fn new(inner: R) -> (Self, RenderLog) {
        let log = RenderLog::default();
        (
            Self {
                inner,
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl<R: BrickRenderer> BrickRenderer for RecordingRenderer<R> {
    fn render(
        &mut self,
        state: &RenderState,
        view: &ViewState,
        bricks: &[Brick],
    ) -> volcast_core::Result<FrameImage> {
        self.log.lock().push(RenderRecord {
            state: state.clone(),
            bricks: bricks.to_vec(),
            at: Instant::now(),
        });
        self.inner.render(state, view, bricks)
    }
}

/// Outcome of one participant session.
pub type SessionResult = std::result::Result<SessionSummary, ServeError>;

type Session = JoinHandle<SessionResult>;

/// Participants served on loopback threads, one coordinator session each.
pub struct LocalCluster {
    addresses: Vec<ParticipantAddress>,
    sessions: Vec<Option<Session>>,
}

impl LocalCluster {
    /// Start one participant per renderer. Participant `i` uses
    /// `renderers[i]`.
    pub fn spawn(renderers: Vec<Box<dyn BrickRenderer>>) -> Result<Self> {
        let mut addresses = Vec::with_capacity(renderers.len());
        let mut sessions = Vec::with_capacity(renderers.len());

        for (index, mut renderer) in renderers.into_iter().enumerate() {
            let server = ParticipantServer::bind("127.0.0.1:0")?;
            let addr = server.local_addr()?;
            debug!(index, %addr, "Test participant listening");

            let session = thread::Builder::new()
                .name(format!("participant-{index}"))
                .spawn(move || server.serve_one(&mut *renderer))?;
            addresses.push(addr.into());
            sessions.push(Some(session));
        }
        Ok(Self {
            addresses,
            sessions,
        })
    }

    /// Participants rendering flat, opaque or translucent colors.
    pub fn flat(colors: &[Vec4]) -> Result<Self> {
        Self::spawn(
            colors
                .iter()
                .map(|&c| Box::new(FlatRenderer::new(c)) as Box<dyn BrickRenderer>)
                .collect(),
        )
    }

    pub fn addresses(&self) -> &[ParticipantAddress] {
        &self.addresses
    }

    /// A small, fast-failing configuration for these participants.
    pub fn config(&self) -> ClusterConfig {
        ClusterConfig::new(self.addresses.clone())
            .with_size(32, 32)
            .with_connect_timeout(Duration::from_secs(5))
            .with_frame_timeout(Duration::from_secs(5))
            .with_background(Vec4::ZERO)
    }

    /// Wait for participant `index` to finish its session.
    pub fn join(&mut self, index: usize) -> Result<SessionResult> {
        let session = self
            .sessions
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(TestError::Panicked(index))?;
        session.join().map_err(|_| TestError::Panicked(index))
    }
}
