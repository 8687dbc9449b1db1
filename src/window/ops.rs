//! Typed operation requests, decoded once from raw `(code, args)` pairs at the boundary.

use crate::foundation::core::{Api, Rect, Timestamp, Transform, Usage};
use crate::foundation::error::{ProducerError, ProducerResult};

/// Value reported for [`QueryOp::ConcreteType`].
pub const CONCRETE_TYPE_SURFACE_TEXTURE_CLIENT: i32 = 2;

/// Query keys understood by a producer window. Anything else is forwarded to the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryOp {
    /// Buffer width (service-owned).
    Width,
    /// Buffer height (service-owned).
    Height,
    /// Requested format if set locally, else the service's.
    Format,
    /// Buffers the consumer keeps undequeued (service-owned).
    MinUndequeuedBuffers,
    /// Whether the queue feeds the window composer.
    QueuesToWindowComposer,
    /// Implementation type of the window.
    ConcreteType,
    /// User width if set, else the negotiated default.
    DefaultWidth,
    /// User height if set, else the negotiated default.
    DefaultHeight,
    /// Transform the consumer would like pre-applied.
    TransformHint,
    /// Whether two or more frames are waiting for the consumer.
    ConsumerRunningBehind,
    /// Unknown key, forwarded verbatim.
    Passthrough(i32),
}

impl QueryOp {
    /// Decode a raw query key.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Width,
            1 => Self::Height,
            2 => Self::Format,
            3 => Self::MinUndequeuedBuffers,
            4 => Self::QueuesToWindowComposer,
            5 => Self::ConcreteType,
            6 => Self::DefaultWidth,
            7 => Self::DefaultHeight,
            8 => Self::TransformHint,
            9 => Self::ConsumerRunningBehind,
            other => Self::Passthrough(other),
        }
    }

    /// Raw query key.
    pub fn code(self) -> i32 {
        match self {
            Self::Width => 0,
            Self::Height => 1,
            Self::Format => 2,
            Self::MinUndequeuedBuffers => 3,
            Self::QueuesToWindowComposer => 4,
            Self::ConcreteType => 5,
            Self::DefaultWidth => 6,
            Self::DefaultHeight => 7,
            Self::TransformHint => 8,
            Self::ConsumerRunningBehind => 9,
            Self::Passthrough(code) => code,
        }
    }
}

/// Raw operation codes accepted by [`WindowOp::decode`].
pub mod opcode {
    /// SET_USAGE(flags)
    pub const SET_USAGE: i32 = 0;
    /// CONNECT (legacy, no effect)
    pub const CONNECT: i32 = 1;
    /// DISCONNECT (legacy, no effect)
    pub const DISCONNECT: i32 = 2;
    /// SET_CROP(left, top, right, bottom) or SET_CROP() to clear
    pub const SET_CROP: i32 = 3;
    /// SET_BUFFER_COUNT(n)
    pub const SET_BUFFER_COUNT: i32 = 4;
    /// SET_BUFFERS_GEOMETRY(w, h, format)
    pub const SET_BUFFERS_GEOMETRY: i32 = 5;
    /// SET_BUFFERS_TRANSFORM(bits)
    pub const SET_BUFFERS_TRANSFORM: i32 = 6;
    /// SET_BUFFERS_TIMESTAMP(ns | i64::MIN for auto)
    pub const SET_BUFFERS_TIMESTAMP: i32 = 7;
    /// SET_BUFFERS_DIMENSIONS(w, h)
    pub const SET_BUFFERS_DIMENSIONS: i32 = 8;
    /// SET_BUFFERS_FORMAT(format)
    pub const SET_BUFFERS_FORMAT: i32 = 9;
    /// SET_SCALING_MODE(mode)
    pub const SET_SCALING_MODE: i32 = 10;
    /// LOCK(left, top, right, bottom) or LOCK() for the full buffer
    pub const LOCK: i32 = 11;
    /// UNLOCK_AND_POST()
    pub const UNLOCK_AND_POST: i32 = 12;
    /// API_CONNECT(api)
    pub const API_CONNECT: i32 = 13;
    /// API_DISCONNECT(api)
    pub const API_DISCONNECT: i32 = 14;
    /// SET_BUFFERS_USER_DIMENSIONS(w, h)
    pub const SET_BUFFERS_USER_DIMENSIONS: i32 = 15;
}

/// A producer operation with its typed payload.
///
/// Dimension, format and scaling-mode payloads stay signed/raw so the producer can reject them
/// with a validation error rather than losing them in decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowOp {
    /// Legacy connect; always succeeds without effect.
    Connect,
    /// Legacy disconnect; always succeeds without effect.
    Disconnect,
    /// Set requested usage bits.
    SetUsage(Usage),
    /// Set or clear (`None`) the crop rectangle.
    SetCrop(Option<Rect>),
    /// Change the ring size.
    SetBufferCount(usize),
    /// Set requested dimensions, then format.
    SetBuffersGeometry {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
        /// Requested format.
        format: i32,
    },
    /// Set the composition transform.
    SetBuffersTransform(Transform),
    /// Set the timestamp of subsequent frames.
    SetBuffersTimestamp(Timestamp),
    /// Set requested dimensions.
    SetBuffersDimensions {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },
    /// Set fallback dimensions used when none are requested.
    SetBuffersUserDimensions {
        /// Fallback width.
        width: i32,
        /// Fallback height.
        height: i32,
    },
    /// Set requested format.
    SetBuffersFormat(i32),
    /// Lock the next buffer for software rendering.
    Lock(Option<Rect>),
    /// Unmap and submit the locked buffer.
    UnlockAndPost,
    /// Set the scaling mode (raw value, validated by the producer).
    SetScalingMode(i32),
    /// Connect as an API.
    ApiConnect(Api),
    /// Disconnect an API.
    ApiDisconnect(Api),
}

fn arg_i32(code: i32, args: &[i64], idx: usize) -> ProducerResult<i32> {
    let raw = args.get(idx).copied().ok_or_else(|| {
        ProducerError::validation(format!("operation {code}: missing argument {idx}"))
    })?;
    i32::try_from(raw).map_err(|_| {
        ProducerError::validation(format!(
            "operation {code}: argument {idx} out of range: {raw}"
        ))
    })
}

/// Bitmask argument: accepts both the signed and unsigned reading of 32 bits.
fn arg_u32_bits(code: i32, args: &[i64], idx: usize) -> ProducerResult<u32> {
    let raw = args.get(idx).copied().ok_or_else(|| {
        ProducerError::validation(format!("operation {code}: missing argument {idx}"))
    })?;
    if !(i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&raw) {
        return Err(ProducerError::validation(format!(
            "operation {code}: argument {idx} out of range: {raw}"
        )));
    }
    Ok(raw as u32)
}

fn arg_rect(code: i32, args: &[i64]) -> ProducerResult<Option<Rect>> {
    match args.len() {
        0 => Ok(None),
        4 => Ok(Some(Rect::new(
            arg_i32(code, args, 0)?,
            arg_i32(code, args, 1)?,
            arg_i32(code, args, 2)?,
            arg_i32(code, args, 3)?,
        ))),
        n => Err(ProducerError::validation(format!(
            "operation {code}: expected 0 or 4 rectangle arguments, got {n}"
        ))),
    }
}

impl WindowOp {
    /// Decode a raw operation code and its integer arguments.
    ///
    /// Unknown codes yield [`ProducerError::OperationNotFound`]; missing or out-of-range
    /// arguments yield [`ProducerError::Validation`].
    pub fn decode(code: i32, args: &[i64]) -> ProducerResult<Self> {
        use opcode::*;
        let op = match code {
            CONNECT => Self::Connect,
            DISCONNECT => Self::Disconnect,
            SET_USAGE => Self::SetUsage(Usage::from_bits_retain(arg_u32_bits(code, args, 0)?)),
            SET_CROP => Self::SetCrop(arg_rect(code, args)?),
            SET_BUFFER_COUNT => {
                let n = arg_i32(code, args, 0)?;
                let n = usize::try_from(n).map_err(|_| {
                    ProducerError::validation(format!("buffer count must be >= 0, got {n}"))
                })?;
                Self::SetBufferCount(n)
            }
            SET_BUFFERS_GEOMETRY => Self::SetBuffersGeometry {
                width: arg_i32(code, args, 0)?,
                height: arg_i32(code, args, 1)?,
                format: arg_i32(code, args, 2)?,
            },
            SET_BUFFERS_TRANSFORM => Self::SetBuffersTransform(Transform::from_bits_retain(
                arg_u32_bits(code, args, 0)?,
            )),
            SET_BUFFERS_TIMESTAMP => {
                let raw = args.first().copied().ok_or_else(|| {
                    ProducerError::validation(format!("operation {code}: missing argument 0"))
                })?;
                Self::SetBuffersTimestamp(Timestamp::from_raw(raw))
            }
            SET_BUFFERS_DIMENSIONS => Self::SetBuffersDimensions {
                width: arg_i32(code, args, 0)?,
                height: arg_i32(code, args, 1)?,
            },
            SET_BUFFERS_USER_DIMENSIONS => Self::SetBuffersUserDimensions {
                width: arg_i32(code, args, 0)?,
                height: arg_i32(code, args, 1)?,
            },
            SET_BUFFERS_FORMAT => Self::SetBuffersFormat(arg_i32(code, args, 0)?),
            SET_SCALING_MODE => Self::SetScalingMode(arg_i32(code, args, 0)?),
            LOCK => Self::Lock(arg_rect(code, args)?),
            UNLOCK_AND_POST => Self::UnlockAndPost,
            API_CONNECT => Self::ApiConnect(Api::try_from(arg_i32(code, args, 0)?)?),
            API_DISCONNECT => Self::ApiDisconnect(Api::try_from(arg_i32(code, args, 0)?)?),
            other => return Err(ProducerError::OperationNotFound(other)),
        };
        Ok(op)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/window/ops.rs"]
mod tests;
