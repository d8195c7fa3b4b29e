//! Test harness for volcast clusters.
//!
//! Runs rendering participants on loopback threads so the coordinator can
//! be exercised end to end, with renderer wrappers that inject delays,
//! stalls and failures.

pub mod harness;

pub use harness::{
    create_test_view, test_volume, DelayedRenderer, FailingRenderer, LocalCluster, RenderLog,
    RenderRecord, RecordingRenderer, SessionResult, StallingRenderer,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cluster error: {0}")]
    Cluster(#[from] volcast_cluster::ClusterError),
    #[error("Participant {0} panicked")]
    Panicked(usize),
}

pub type Result<T> = std::result::Result<T, TestError>;
