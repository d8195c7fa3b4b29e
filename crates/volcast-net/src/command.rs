//! Commands sent from the coordinator and the state they establish.

use std::io::{Read, Write};

use glam::{Mat4, Vec3};
use volcast_core::{Brick, TransferFunction, ViewState};

use crate::channel::{MessageReader, MessageWriter};
use crate::error::Result;
use crate::protocol::CommReason;

/// A reason tag together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Matrix { projection: Mat4, modelview: Mat4 },
    Resize { width: i32, height: i32 },
    CurrentFrame(i32),
    MipMode(i32),
    ObjectDirection(Vec3),
    ViewingDirection(Vec3),
    Position(Vec3),
    ToggleRoi(bool),
    RoiPosition(Vec3),
    RoiSize(Vec3),
    ToggleBoundingBox,
    TransferFunction(TransferFunction),
    Quality(f32),
    Interpolation(bool),
    Bricks(Vec<Brick>),
    Exit,
}

impl Command {
    /// The tag announcing this command.
    pub const fn reason(&self) -> CommReason {
        match self {
            Self::Matrix { .. } => CommReason::Matrix,
            Self::Resize { .. } => CommReason::Resize,
            Self::CurrentFrame(_) => CommReason::CurrentFrame,
            Self::MipMode(_) => CommReason::MipMode,
            Self::ObjectDirection(_) => CommReason::ObjectDirection,
            Self::ViewingDirection(_) => CommReason::ViewingDirection,
            Self::Position(_) => CommReason::Position,
            Self::ToggleRoi(_) => CommReason::ToggleRoi,
            Self::RoiPosition(_) => CommReason::RoiPosition,
            Self::RoiSize(_) => CommReason::RoiSize,
            Self::ToggleBoundingBox => CommReason::ToggleBoundingBox,
            Self::TransferFunction(_) => CommReason::TransferFunction,
            Self::Quality(_) => CommReason::Quality,
            Self::Interpolation(_) => CommReason::Interpolation,
            Self::Bricks(_) => CommReason::Bricks,
            Self::Exit => CommReason::Exit,
        }
    }

    /// Camera matrices for one frame.
    pub const fn matrix(view: &ViewState) -> Self {
        Self::Matrix {
            projection: view.projection,
            modelview: view.modelview,
        }
    }
}

impl<W: Write> MessageWriter<W> {
    /// Send the reason tag, then the payload.
    ///
    /// If the tag fails the payload is never written.
    pub fn write_command(&mut self, command: &Command) -> Result<()> {
        self.put_reason(command.reason())?;
        match command {
            Command::Matrix {
                projection,
                modelview,
            } => {
                self.put_matrix(projection)?;
                self.put_matrix(modelview)
            }
            Command::Resize { width, height } => self.put_win_dims(*width, *height),
            Command::CurrentFrame(v) | Command::MipMode(v) => self.put_int32(*v),
            Command::ObjectDirection(v)
            | Command::ViewingDirection(v)
            | Command::Position(v)
            | Command::RoiPosition(v)
            | Command::RoiSize(v) => self.put_vector3(*v),
            Command::ToggleRoi(v) | Command::Interpolation(v) => self.put_bool(*v),
            Command::TransferFunction(tf) => self.put_transfer_function(tf),
            Command::Quality(v) => self.put_float(*v),
            Command::Bricks(bricks) => self.put_bricks(bricks),
            Command::ToggleBoundingBox | Command::Exit => Ok(()),
        }
    }
}

impl<R: Read> MessageReader<R> {
    /// Read a reason tag and the payload it announces.
    pub fn read_command(&mut self) -> Result<Command> {
        let command = match self.get_reason()? {
            CommReason::Matrix => Command::Matrix {
                projection: self.get_matrix()?,
                modelview: self.get_matrix()?,
            },
            CommReason::Resize => {
                let (width, height) = self.get_win_dims()?;
                Command::Resize { width, height }
            }
            CommReason::CurrentFrame => Command::CurrentFrame(self.get_int32()?),
            CommReason::MipMode => Command::MipMode(self.get_int32()?),
            CommReason::ObjectDirection => Command::ObjectDirection(self.get_vector3()?),
            CommReason::ViewingDirection => Command::ViewingDirection(self.get_vector3()?),
            CommReason::Position => Command::Position(self.get_vector3()?),
            CommReason::ToggleRoi => Command::ToggleRoi(self.get_bool()?),
            CommReason::RoiPosition => Command::RoiPosition(self.get_vector3()?),
            CommReason::RoiSize => Command::RoiSize(self.get_vector3()?),
            CommReason::ToggleBoundingBox => Command::ToggleBoundingBox,
            CommReason::TransferFunction => {
                Command::TransferFunction(self.get_transfer_function()?)
            }
            CommReason::Quality => Command::Quality(self.get_float()?),
            CommReason::Interpolation => Command::Interpolation(self.get_bool()?),
            CommReason::Bricks => Command::Bricks(self.get_bricks()?),
            CommReason::Exit => Command::Exit,
        };
        Ok(command)
    }
}

/// Rendering parameters established by commands.
///
/// The coordinator mirrors the last successfully sent value of every
/// parameter so a participant can be brought back in sync.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub view: ViewState,
    pub width: i32,
    pub height: i32,
    pub current_frame: i32,
    pub mip_mode: i32,
    pub object_direction: Option<Vec3>,
    pub viewing_direction: Option<Vec3>,
    pub position: Option<Vec3>,
    pub roi_enabled: bool,
    pub roi_position: Vec3,
    pub roi_size: Vec3,
    pub bounding_box: bool,
    pub transfer_function: Option<TransferFunction>,
    pub quality: f32,
    pub interpolation: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            view: ViewState::default(),
            width: 0,
            height: 0,
            current_frame: 0,
            mip_mode: 0,
            object_direction: None,
            viewing_direction: None,
            position: None,
            roi_enabled: false,
            roi_position: Vec3::ZERO,
            roi_size: Vec3::splat(0.5),
            bounding_box: false,
            transfer_function: None,
            quality: 1.0,
            interpolation: true,
        }
    }
}

impl RenderState {
    /// Update the state with a command's payload.
    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::Matrix {
                projection,
                modelview,
            } => self.view = ViewState::new(*projection, *modelview),
            Command::Resize { width, height } => {
                self.width = *width;
                self.height = *height;
            }
            Command::CurrentFrame(v) => self.current_frame = *v,
            Command::MipMode(v) => self.mip_mode = *v,
            Command::ObjectDirection(v) => self.object_direction = Some(*v),
            Command::ViewingDirection(v) => self.viewing_direction = Some(*v),
            Command::Position(v) => self.position = Some(*v),
            Command::ToggleRoi(v) => self.roi_enabled = *v,
            Command::RoiPosition(v) => self.roi_position = *v,
            Command::RoiSize(v) => self.roi_size = *v,
            Command::ToggleBoundingBox => self.bounding_box = !self.bounding_box,
            Command::TransferFunction(tf) => self.transfer_function = Some(tf.clone()),
            Command::Quality(v) => self.quality = *v,
            Command::Interpolation(v) => self.interpolation = *v,
            Command::Bricks(_) | Command::Exit => {}
        }
    }

    /// Commands that bring a freshly started participant to this state.
    ///
    /// Camera matrices are not included; the next frame sends them.
    pub fn replay(&self) -> Vec<Command> {
        let fresh = Self::default();
        let mut commands = vec![
            Command::Resize {
                width: self.width,
                height: self.height,
            },
            Command::CurrentFrame(self.current_frame),
            Command::MipMode(self.mip_mode),
        ];
        commands.extend(self.object_direction.map(Command::ObjectDirection));
        commands.extend(self.viewing_direction.map(Command::ViewingDirection));
        commands.extend(self.position.map(Command::Position));
        commands.push(Command::ToggleRoi(self.roi_enabled));
        commands.push(Command::RoiPosition(self.roi_position));
        commands.push(Command::RoiSize(self.roi_size));
        if self.bounding_box != fresh.bounding_box {
            commands.push(Command::ToggleBoundingBox);
        }
        commands.extend(self.transfer_function.clone().map(Command::TransferFunction));
        commands.push(Command::Quality(self.quality));
        commands.push(Command::Interpolation(self.interpolation));
        commands
    }
}
