use crate::id::{ClassId, TrackId};
use crate::session::SessionState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("slot {0} is out of range")]
    SlotOutOfRange(usize),

    #[error("slot {0} has been deleted")]
    SlotDeleted(usize),

    #[error("unknown class `{0}`")]
    UnknownClass(ClassId),

    #[error("class `{class}` has no track `{track}`")]
    UnknownTrack { class: ClassId, track: TrackId },

    #[error("slot {slot} does not belong to track `{track}` of class `{class}`")]
    SlotNotInTrack {
        slot: usize,
        class: ClassId,
        track: TrackId,
    },

    #[error("track `{track}` of class `{class}` already has a box at frame {frame}")]
    FrameOccupied {
        class: ClassId,
        track: TrackId,
        frame: u32,
    },

    #[error("reassignment names neither a new class nor a new track")]
    EmptyReassignment,

    #[error("keyframes at {0} and {1} leave no frame to interpolate")]
    NoIntermediateFrames(u32, u32),

    #[error("second keyframe must keep class `{class}` and track `{track}`")]
    IdentityMismatch { class: ClassId, track: TrackId },

    #[error("an edit session is already active")]
    SessionActive,

    #[error("no edit session is active")]
    NoActiveSession,

    #[error("cannot {action} while the session is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("store is inconsistent: {0}")]
    Inconsistent(String),

    #[error("persist failed: {0}")]
    Persist(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
