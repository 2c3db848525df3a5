//! Little-endian framing for moves and acknowledgements.
//!
//! ```text
//! frame  := type:u8 flags:u8 body
//! move   := tick:u64 dt:f32 yaw:f32 [accel:3xf32] end:3xf32
//! ack    := tick:u64 [position:3xf32 velocity:3xf32 mode:u8]
//! ```
//!
//! Optional fields are present only when their flag bit is set. Only the
//! derived "wants to unstick" bit of the wall-run state is ever sent.

use glam::Vec3;
use thiserror::Error;

use crate::components::MovementMode;

mod frame_type {
    pub const MOVE: u8 = 0x01;
    pub const ACK: u8 = 0x02;
}

mod move_flags {
    pub const JUMP: u8 = 1 << 0;
    pub const HAS_ACCELERATION: u8 = 1 << 1;
    pub const WANTS_TO_UNSTICK: u8 = 1 << 2;
    pub const ALL: u8 = JUMP | HAS_ACCELERATION | WANTS_TO_UNSTICK;
}

mod ack_flags {
    pub const HAS_CORRECTION: u8 = 1 << 0;
    pub const ALL: u8 = HAS_CORRECTION;
}

/// One client move as sent to the authority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveMessage {
    pub tick: u64,
    pub dt: f32,
    pub acceleration: Vec3,
    pub facing_yaw: f32,
    pub jump: bool,
    pub wants_to_unstick: bool,
    /// Where the client's prediction ended up.
    pub end_location: Vec3,
}

/// Authoritative state the client must rewind to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mode: MovementMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveAck {
    pub tick: u64,
    pub correction: Option<Correction>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Move(MoveMessage),
    Ack(MoveAck),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated frame: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unknown frame type: 0x{0:02x}")]
    UnknownFrameType(u8),
    #[error("unknown flag bits: 0x{0:02x}")]
    UnknownFlags(u8),
    #[error("unknown movement mode: {0}")]
    UnknownMode(u8),
    #[error("non-finite {0}")]
    NonFinite(&'static str),
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

fn mode_to_u8(mode: MovementMode) -> u8 {
    match mode {
        MovementMode::Walking => 0,
        MovementMode::Falling => 1,
        MovementMode::WallRunning => 2,
    }
}

fn mode_from_u8(v: u8) -> Result<MovementMode, WireError> {
    match v {
        0 => Ok(MovementMode::Walking),
        1 => Ok(MovementMode::Falling),
        2 => Ok(MovementMode::WallRunning),
        other => Err(WireError::UnknownMode(other)),
    }
}

struct FrameWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> FrameWriter<'a> {
    fn new(buf: &'a mut Vec<u8>) -> Self {
        buf.clear();
        Self { buf }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_vec3(&mut self, v: Vec3) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
    }
}

struct FrameReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> FrameReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        if self.remaining() < N {
            return Err(WireError::Truncated {
                need: N,
                have: self.remaining(),
            });
        }
        let mut arr = [0u8; N];
        arr.copy_from_slice(&self.buf[self.cursor..self.cursor + N]);
        self.cursor += N;
        Ok(arr)
    }

    fn take_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take::<1>()?[0])
    }

    fn take_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    fn take_f32(&mut self, what: &'static str) -> Result<f32, WireError> {
        let v = f32::from_le_bytes(self.take()?);
        if v.is_finite() {
            Ok(v)
        } else {
            Err(WireError::NonFinite(what))
        }
    }

    fn take_vec3(&mut self, what: &'static str) -> Result<Vec3, WireError> {
        Ok(Vec3::new(self.take_f32(what)?, self.take_f32(what)?, self.take_f32(what)?))
    }

    fn finish(&self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::TrailingBytes(n)),
        }
    }
}

/// Encode a frame into `buf`. The buffer is cleared and reused.
pub fn encode(frame: &Frame, buf: &mut Vec<u8>) {
    let mut w = FrameWriter::new(buf);
    match frame {
        Frame::Move(m) => {
            let mut flags = 0;
            if m.jump {
                flags |= move_flags::JUMP;
            }
            if m.acceleration != Vec3::ZERO {
                flags |= move_flags::HAS_ACCELERATION;
            }
            if m.wants_to_unstick {
                flags |= move_flags::WANTS_TO_UNSTICK;
            }
            w.put_u8(frame_type::MOVE);
            w.put_u8(flags);
            w.put_u64(m.tick);
            w.put_f32(m.dt);
            w.put_f32(m.facing_yaw);
            if flags & move_flags::HAS_ACCELERATION != 0 {
                w.put_vec3(m.acceleration);
            }
            w.put_vec3(m.end_location);
        }
        Frame::Ack(a) => {
            let flags = if a.correction.is_some() {
                ack_flags::HAS_CORRECTION
            } else {
                0
            };
            w.put_u8(frame_type::ACK);
            w.put_u8(flags);
            w.put_u64(a.tick);
            if let Some(c) = &a.correction {
                w.put_vec3(c.position);
                w.put_vec3(c.velocity);
                w.put_u8(mode_to_u8(c.mode));
            }
        }
    }
}

/// Decode exactly one frame; trailing bytes are an error.
pub fn decode(bytes: &[u8]) -> Result<Frame, WireError> {
    let mut r = FrameReader::new(bytes);
    let kind = r.take_u8()?;
    let flags = r.take_u8()?;

    let frame = match kind {
        frame_type::MOVE => {
            if flags & !move_flags::ALL != 0 {
                return Err(WireError::UnknownFlags(flags));
            }
            let tick = r.take_u64()?;
            let dt = r.take_f32("dt")?;
            let facing_yaw = r.take_f32("facing yaw")?;
            let acceleration = if flags & move_flags::HAS_ACCELERATION != 0 {
                r.take_vec3("acceleration")?
            } else {
                Vec3::ZERO
            };
            let end_location = r.take_vec3("end location")?;
            Frame::Move(MoveMessage {
                tick,
                dt,
                acceleration,
                facing_yaw,
                jump: flags & move_flags::JUMP != 0,
                wants_to_unstick: flags & move_flags::WANTS_TO_UNSTICK != 0,
                end_location,
            })
        }
        frame_type::ACK => {
            if flags & !ack_flags::ALL != 0 {
                return Err(WireError::UnknownFlags(flags));
            }
            let tick = r.take_u64()?;
            let correction = if flags & ack_flags::HAS_CORRECTION != 0 {
                let position = r.take_vec3("position")?;
                let velocity = r.take_vec3("velocity")?;
                let mode = mode_from_u8(r.take_u8()?)?;
                Some(Correction {
                    position,
                    velocity,
                    mode,
                })
            } else {
                None
            };
            Frame::Ack(MoveAck { tick, correction })
        }
        other => return Err(WireError::UnknownFrameType(other)),
    };
    r.finish()?;
    Ok(frame)
}
