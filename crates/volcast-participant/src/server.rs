//! Participant server loop.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use hashbrown::HashMap;
use tracing::{debug, info, warn};
use volcast_core::Brick;
use volcast_net::{Command, MessageReader, MessageWriter, NetError, RenderState, PROTOCOL_VERSION};

use crate::error::Result;
use crate::renderer::BrickRenderer;

/// What happened during one coordinator session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Images sent back to the coordinator.
    pub frames_rendered: u64,
    /// Commands received, including camera updates.
    pub commands: u64,
    /// True if the coordinator sent `Exit`, false if it hung up.
    pub clean_exit: bool,
}

/// Listens for a coordinator on a TCP port.
pub struct ParticipantServer {
    listener: TcpListener,
}

impl ParticipantServer {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one coordinator and serve it until it exits or disconnects.
    pub fn serve_one<B: BrickRenderer + ?Sized>(&self, renderer: &mut B) -> Result<SessionSummary> {
        let (stream, peer) = self.listener.accept()?;
        stream.set_nodelay(true)?;
        info!(%peer, "Coordinator connected");

        let mut reader = MessageReader::new(stream.try_clone()?);
        let mut writer = MessageWriter::new(stream);

        let remote = reader.get_hello()?;
        writer.put_hello()?;
        if remote != PROTOCOL_VERSION {
            return Err(NetError::ProtocolMismatch {
                local: PROTOCOL_VERSION,
                remote,
            }
            .into());
        }

        let summary = run_session(reader, writer, renderer)?;
        info!(
            %peer,
            frames = summary.frames_rendered,
            clean = summary.clean_exit,
            "Coordinator session ended"
        );
        Ok(summary)
    }
}

/// Serve commands from an already established channel.
///
/// Brick lists are kept per time step; a new list for a time step replaces
/// the previous one. Every `Matrix` command is answered with exactly one
/// image, rendered from the bricks of the current time step.
pub fn run_session<R, W, B>(
    mut reader: MessageReader<R>,
    mut writer: MessageWriter<W>,
    renderer: &mut B,
) -> Result<SessionSummary>
where
    R: Read,
    W: Write,
    B: BrickRenderer + ?Sized,
{
    let mut state = RenderState::default();
    let mut bricks: HashMap<u32, Vec<Brick>> = HashMap::new();
    let mut summary = SessionSummary::default();

    loop {
        let command = match reader.read_command() {
            Ok(command) => command,
            Err(NetError::Closed) => break,
            Err(e) if e.is_disconnect() => {
                warn!("Coordinator connection lost: {e}");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        summary.commands += 1;

        match command {
            Command::Exit => {
                summary.clean_exit = true;
                break;
            }
            Command::Bricks(list) => {
                let mut incoming: HashMap<u32, Vec<Brick>> = HashMap::new();
                for brick in list {
                    incoming.entry(brick.frame).or_default().push(brick);
                }
                debug!(time_steps = incoming.len(), "Received bricks");
                bricks.extend(incoming);
            }
            Command::Matrix { .. } => {
                state.apply(&command);
                let current = u32::try_from(state.current_frame)
                    .ok()
                    .and_then(|frame| bricks.get(&frame))
                    .map_or(&[][..], Vec::as_slice);

                let image = renderer.render(&state, &state.view, current)?;
                summary.frames_rendered += 1;
                writer.put_image(&image.with_frame(summary.frames_rendered))?;
            }
            other => {
                debug!(reason = ?other.reason(), "State update");
                state.apply(&other);
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::FlatRenderer;
    use glam::{Vec3, Vec4};
    use std::io::Cursor;
    use volcast_core::{Aabb, FrameImage, ViewState};
    use volcast_net::protocol::{read_frame, Message};

    /// Records the bricks it was asked to render.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(i32, Vec<Brick>)>,
    }

    impl BrickRenderer for Recorder {
        fn render(
            &mut self,
            state: &RenderState,
            _view: &ViewState,
            bricks: &[Brick],
        ) -> volcast_core::Result<FrameImage> {
            self.calls.push((state.current_frame, bricks.to_vec()));
            Ok(FrameImage::empty(0))
        }
    }

    fn script(commands: &[Command]) -> MessageReader<Cursor<Vec<u8>>> {
        let mut writer = MessageWriter::new(Vec::new());
        for command in commands {
            writer.write_command(command).unwrap();
        }
        MessageReader::new(Cursor::new(writer.into_inner()))
    }

    fn brick(frame: u32, x: f32) -> Brick {
        Brick::new(Aabb::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0)), 0, frame)
    }

    #[test]
    fn renders_bricks_of_current_time_step() {
        let view = ViewState::default();
        let reader = script(&[
            Command::Bricks(vec![brick(0, 0.0), brick(1, 5.0)]),
            Command::matrix(&view),
            Command::CurrentFrame(1),
            Command::matrix(&view),
            Command::CurrentFrame(7),
            Command::matrix(&view),
            Command::Exit,
        ]);
        let mut renderer = Recorder::default();
        let summary = run_session(reader, MessageWriter::new(Vec::new()), &mut renderer).unwrap();

        assert_eq!(summary.frames_rendered, 3);
        assert_eq!(summary.commands, 7);
        assert!(summary.clean_exit);
        assert_eq!(renderer.calls[0], (0, vec![brick(0, 0.0)]));
        assert_eq!(renderer.calls[1], (1, vec![brick(1, 5.0)]));
        assert_eq!(renderer.calls[2], (7, Vec::new()));
    }

    #[test]
    fn each_matrix_yields_one_numbered_image() {
        let view = ViewState::default();
        let reader = script(&[
            Command::Resize {
                width: 4,
                height: 4,
            },
            Command::Bricks(vec![Brick::new(
                Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
                0,
                0,
            )]),
            Command::matrix(&view),
            Command::matrix(&view),
        ]);
        let mut renderer = FlatRenderer::new(Vec4::ONE);
        let mut sink = Vec::new();
        let summary = run_session(reader, MessageWriter::new(&mut sink), &mut renderer).unwrap();
        // Stream ended without Exit.
        assert!(!summary.clean_exit);

        let mut cursor = Cursor::new(sink);
        for expected in 1..=2 {
            match read_frame(&mut cursor).unwrap() {
                Message::Image(image) => {
                    assert_eq!(image.frame, expected);
                    assert_eq!(image.rect.area(), 4);
                }
                other => panic!("expected image, got {}", other.kind()),
            }
        }
    }

    #[test]
    fn newer_brick_list_replaces_time_step() {
        let view = ViewState::default();
        let reader = script(&[
            Command::Bricks(vec![brick(0, 0.0), brick(0, 1.0)]),
            Command::Bricks(vec![brick(0, 2.0)]),
            Command::matrix(&view),
        ]);
        let mut renderer = Recorder::default();
        run_session(reader, MessageWriter::new(Vec::new()), &mut renderer).unwrap();
        assert_eq!(renderer.calls[0].1, vec![brick(0, 2.0)]);
    }

    #[test]
    fn serves_coordinator_over_tcp() {
        let server = ParticipantServer::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let mut renderer = FlatRenderer::new(Vec4::ONE);
            server.serve_one(&mut renderer)
        });

        let (mut proxy, mut receiver) =
            volcast_net::connect(2, addr, std::time::Duration::from_secs(5)).unwrap();
        proxy
            .send(&Command::Resize {
                width: 8,
                height: 8,
            })
            .unwrap();
        proxy.put_bricks(&[brick(0, -0.5)]).unwrap();
        proxy.send(&Command::matrix(&ViewState::default())).unwrap();
        let image = receiver.get_image().unwrap();
        assert_eq!(image.participant, 2);
        assert!(!image.rect.is_empty());
        proxy.exit().unwrap();

        let summary = handle.join().unwrap().unwrap();
        assert_eq!(summary.frames_rendered, 1);
        assert!(summary.clean_exit);
    }
}
