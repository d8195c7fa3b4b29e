//! Cluster configuration.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use glam::{Vec3, Vec4};

use crate::compositor::CompositeOrder;
use crate::error::{ClusterError, Result};

/// Host and port of one rendering participant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParticipantAddress {
    pub host: String,
    pub port: u16,
}

impl ParticipantAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`. IPv6 hosts may be bracketed (`[::1]:31050`).
    pub fn parse(s: &str) -> Result<Self> {
        let invalid =
            || ClusterError::InvalidConfiguration(format!("invalid participant address `{s}`"));
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let port: u16 = port.parse().map_err(|_| invalid())?;
        if host.is_empty() || port == 0 {
            return Err(invalid());
        }
        Ok(Self::new(host, port))
    }

    /// Resolve to the first matching socket address.
    pub fn resolve(&self) -> std::io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address found for {self}"),
                )
            })
    }
}

impl From<SocketAddr> for ParticipantAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for ParticipantAddress {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ParticipantAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// What to composite for a participant that missed a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartialFramePolicy {
    /// Use the participant's most recent image.
    #[default]
    ReuseLastImage,
    /// Leave the participant's region out.
    Skip,
    /// Fail the frame.
    Abort,
}

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// One entry per participant. The index is the participant index.
    pub participants: Vec<ParticipantAddress>,
    /// Bound on connecting and on the handshake.
    pub connect_timeout: Duration,
    /// Bound on waiting for all images of one frame.
    pub frame_timeout: Duration,
    /// Framebuffer width.
    pub width: u32,
    /// Framebuffer height.
    pub height: u32,
    /// Premultiplied background color.
    pub background: Vec4,
    pub order: CompositeOrder,
    pub partial_frame_policy: PartialFramePolicy,
    /// Largest brick size; `None` sends each partition as a single brick.
    pub brick_extent: Option<Vec3>,
    /// Relative rendering capacity per participant.
    pub weights: Option<Vec<f32>>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            participants: Vec::new(),
            connect_timeout: Duration::from_secs(5),
            frame_timeout: Duration::from_secs(10),
            width: 640,
            height: 480,
            background: Vec4::new(0.0, 0.0, 0.0, 1.0),
            order: CompositeOrder::default(),
            partial_frame_policy: PartialFramePolicy::default(),
            brick_extent: None,
            weights: None,
        }
    }
}

impl ClusterConfig {
    /// Create a new config for the given participants.
    pub fn new(participants: Vec<ParticipantAddress>) -> Self {
        Self {
            participants,
            ..Default::default()
        }
    }

    /// Set the framebuffer dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub fn with_background(mut self, background: Vec4) -> Self {
        self.background = background;
        self
    }

    pub fn with_order(mut self, order: CompositeOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_partial_frame_policy(mut self, policy: PartialFramePolicy) -> Self {
        self.partial_frame_policy = policy;
        self
    }

    pub fn with_brick_extent(mut self, extent: Vec3) -> Self {
        self.brick_extent = Some(extent);
        self
    }

    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Check the configuration before any connection is made.
    pub fn validate(&self) -> Result<()> {
        if self.participants.is_empty() {
            return Err(ClusterError::NoParticipants);
        }
        if self.frame_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ClusterError::InvalidConfiguration(
                "timeouts must be non-zero".into(),
            ));
        }
        if let Some(weights) = &self.weights {
            if weights.len() != self.participants.len() {
                return Err(ClusterError::InvalidConfiguration(format!(
                    "{} weights given for {} participants",
                    weights.len(),
                    self.participants.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let addr = ParticipantAddress::parse("render-07:31050").unwrap();
        assert_eq!(addr, ParticipantAddress::new("render-07", 31050));
        assert_eq!(addr.to_string(), "render-07:31050");

        let v6: ParticipantAddress = "[::1]:9000".parse().unwrap();
        assert_eq!(v6.host, "::1");
        assert_eq!(v6.to_string(), "[::1]:9000");
    }

    #[test]
    fn rejects_bad_addresses() {
        for bad in ["", "host", ":80", "host:", "host:0", "host:70000", "host:port"] {
            assert!(ParticipantAddress::parse(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn resolves_loopback() {
        let addr = ParticipantAddress::new("127.0.0.1", 4000).resolve().unwrap();
        assert_eq!(addr, "127.0.0.1:4000".parse().unwrap());
    }

    #[test]
    fn builder_sets_fields() {
        let config = ClusterConfig::new(vec![ParticipantAddress::new("a", 1)])
            .with_size(320, 200)
            .with_frame_timeout(Duration::from_millis(250))
            .with_partial_frame_policy(PartialFramePolicy::Skip);
        assert_eq!((config.width, config.height), (320, 200));
        assert_eq!(config.frame_timeout, Duration::from_millis(250));
        assert_eq!(config.partial_frame_policy, PartialFramePolicy::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_catches_mismatches() {
        assert!(matches!(
            ClusterConfig::default().validate(),
            Err(ClusterError::NoParticipants)
        ));
        let config = ClusterConfig::new(vec![ParticipantAddress::new("a", 1)])
            .with_weights(vec![1.0, 2.0]);
        assert!(matches!(
            config.validate(),
            Err(ClusterError::InvalidConfiguration(_))
        ));
    }
}
