//! Coordinator-side handles on one participant connection.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use volcast_core::{Brick, FrameImage};

use crate::channel::{MessageReader, MessageWriter};
use crate::command::{Command, RenderState};
use crate::error::{NetError, Result};
use crate::protocol::PROTOCOL_VERSION;

/// Shuts a connection down from any thread.
///
/// Closing unblocks a worker parked in [`ImageReceiver::get_image`].
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    stream: Arc<TcpStream>,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream: Arc::new(stream),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shut down both directions. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // The peer may already be gone.
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }
}

/// Connect to a participant and perform the version handshake.
///
/// Returns the write half for the coordinator and the read half for the
/// participant's image worker.
pub fn connect(
    participant: usize,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<(ParticipantProxy, ImageReceiver)> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_nodelay(true)?;

    let mut writer = MessageWriter::new(stream.try_clone()?);
    let mut reader = MessageReader::new(stream.try_clone()?);

    writer.put_hello()?;
    stream.set_read_timeout(Some(timeout))?;
    let remote = reader.get_hello()?;
    stream.set_read_timeout(None)?;
    if remote != PROTOCOL_VERSION {
        return Err(NetError::ProtocolMismatch {
            local: PROTOCOL_VERSION,
            remote,
        });
    }
    debug!(participant, %addr, "Participant connected");

    let handle = ConnectionHandle::new(stream);
    let proxy = ParticipantProxy {
        handle: Some(handle.clone()),
        ..ParticipantProxy::from_writer(participant, writer.into_inner())
    };
    let receiver = ImageReceiver {
        handle: Some(handle),
        ..ImageReceiver::from_reader(participant, reader)
    };
    Ok((proxy, receiver))
}

/// Write half of a participant connection plus the state it has accepted.
pub struct ParticipantProxy<W: Write = TcpStream> {
    participant: usize,
    writer: MessageWriter<W>,
    state: RenderState,
    connected: bool,
    handle: Option<ConnectionHandle>,
}

impl<W: Write> ParticipantProxy<W> {
    /// Proxy over an arbitrary writer, without a closable socket.
    pub fn from_writer(participant: usize, writer: W) -> Self {
        Self {
            participant,
            writer: MessageWriter::new(writer),
            state: RenderState::default(),
            connected: true,
            handle: None,
        }
    }

    pub fn participant(&self) -> usize {
        self.participant
    }

    pub fn is_connected(&self) -> bool {
        self.connected && !self.handle.as_ref().is_some_and(ConnectionHandle::is_closed)
    }

    /// Last state the participant accepted.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn shutdown_handle(&self) -> Option<ConnectionHandle> {
        self.handle.clone()
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Send a command and, once written, mirror it into the local state.
    ///
    /// A write failure leaves the stream out of frame, so the connection is
    /// closed and later sends fail with [`NetError::Closed`].
    pub fn send(&mut self, command: &Command) -> Result<()> {
        if !self.is_connected() {
            return Err(NetError::Closed);
        }
        match self.writer.write_command(command) {
            Ok(()) => {
                self.state.apply(command);
                Ok(())
            }
            Err(e) => {
                warn!(
                    participant = self.participant,
                    reason = ?command.reason(),
                    "Send failed: {e}"
                );
                self.close();
                Err(e)
            }
        }
    }

    /// Send the brick list for one time step.
    pub fn put_bricks(&mut self, bricks: &[Brick]) -> Result<()> {
        self.send(&Command::Bricks(bricks.to_vec()))
    }

    /// Re-send every mirrored parameter.
    pub fn resync(&mut self) -> Result<()> {
        for command in self.state.replay() {
            self.send(&command)?;
        }
        Ok(())
    }

    /// Tell the participant to stop, then close the connection.
    pub fn exit(&mut self) -> Result<()> {
        let result = if self.is_connected() {
            self.writer.write_command(&Command::Exit)
        } else {
            Ok(())
        };
        self.close();
        result
    }

    pub fn close(&mut self) {
        self.connected = false;
        if let Some(handle) = &self.handle {
            handle.close();
        }
    }
}

/// Read half of a participant connection.
pub struct ImageReceiver<R: Read = TcpStream> {
    participant: usize,
    reader: MessageReader<R>,
    handle: Option<ConnectionHandle>,
}

impl<R: Read> ImageReceiver<R> {
    pub fn from_reader(participant: usize, reader: MessageReader<R>) -> Self {
        Self {
            participant,
            reader,
            handle: None,
        }
    }

    pub fn participant(&self) -> usize {
        self.participant
    }

    pub fn shutdown_handle(&self) -> Option<ConnectionHandle> {
        self.handle.clone()
    }

    /// True once the connection was closed locally.
    pub fn is_closed(&self) -> bool {
        self.handle.as_ref().is_some_and(ConnectionHandle::is_closed)
    }

    /// Block until one complete image arrives.
    ///
    /// The image is attributed to this connection's participant regardless
    /// of what the peer claims.
    pub fn get_image(&mut self) -> Result<FrameImage> {
        match self.reader.get_image() {
            Ok(mut image) => {
                image.participant = self.participant;
                Ok(image)
            }
            Err(_) if self.is_closed() => Err(NetError::Closed),
            Err(e) => Err(e),
        }
    }
}
