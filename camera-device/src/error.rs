use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Reason codes reported by the camera service when it refuses a call.
///
/// The numbering matches `CameraAccessException` so service adapters can
/// convert raw codes with [`AccessReason::try_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum AccessReason {
    Disabled = 1,
    Disconnected = 2,
    Error = 3,
    InUse = 4,
    MaxInUse = 5,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("CameraDevice was already closed")]
    DeviceClosed,

    #[error("The camera device has encountered a serious error")]
    DeviceInError,

    #[error("The camera is currently busy. You must wait until the previous operation completes")]
    Busy,

    #[error("The maximum number of camera devices are already open")]
    MaxCamerasInUse,

    #[error("The camera device is disabled by device policy")]
    Disabled,

    #[error("The camera device is no longer connected")]
    Disconnected,

    #[error("The camera device reported an error")]
    CameraFailure,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Active repeating request ongoing")]
    RepeatingRequestActive,

    #[error("Camera service transport failure: {0}")]
    Transport(String),
}

impl CameraError {
    /// The service reason code this error corresponds to, if any
    pub fn reason(&self) -> Option<AccessReason> {
        match self {
            CameraError::Busy => Some(AccessReason::InUse),
            CameraError::MaxCamerasInUse => Some(AccessReason::MaxInUse),
            CameraError::Disabled => Some(AccessReason::Disabled),
            CameraError::Disconnected => Some(AccessReason::Disconnected),
            CameraError::CameraFailure | CameraError::DeviceInError => Some(AccessReason::Error),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// Failures reported by a [`CaptureService`](crate::CaptureService) call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Camera service refused the call: {0:?}")]
    Access(AccessReason),
    #[error("Camera service rejected an argument: {0}")]
    IllegalArgument(String),
    #[error("Camera service transport failure: {0}")]
    Transport(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

impl From<AccessReason> for CameraError {
    fn from(value: AccessReason) -> Self {
        match value {
            AccessReason::Disabled => CameraError::Disabled,
            AccessReason::Disconnected => CameraError::Disconnected,
            AccessReason::Error => CameraError::CameraFailure,
            AccessReason::InUse => CameraError::Busy,
            AccessReason::MaxInUse => CameraError::MaxCamerasInUse,
        }
    }
}

impl From<RemoteError> for CameraError {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::Access(reason) => reason.into(),
            RemoteError::IllegalArgument(msg) => CameraError::InvalidArgument(msg),
            RemoteError::Transport(msg) => CameraError::Transport(msg),
        }
    }
}
