// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fmt;

use x11rb::errors::{ConnectError, ConnectionError, ReplyError};

/// Errors from the X11 backend.
#[derive(Debug)]
pub enum X11Error {
    /// The display could not be opened.
    Connect(ConnectError),
    /// The connection broke.
    Connection(ConnectionError),
    /// The server answered a request with an error.
    Reply(ReplyError),
    /// The server lacks `RandR` 1.2.
    RandrUnavailable {
        /// Reported major version.
        major: u32,
        /// Reported minor version.
        minor: u32,
    },
    /// A value does not fit the protocol field it is sent in.
    ValueOutOfRange(&'static str),
    /// `RRSetCrtcConfig` answered with a non-success status.
    ConfigRejected(u8),
}

impl fmt::Display for X11Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "cannot open display: {e}"),
            Self::Connection(e) => write!(f, "X11 connection error: {e}"),
            Self::Reply(e) => write!(f, "X11 request failed: {e}"),
            Self::RandrUnavailable { major, minor } => {
                write!(f, "RandR 1.2 required, server has {major}.{minor}")
            }
            Self::ValueOutOfRange(field) => write!(f, "{field} does not fit the protocol"),
            Self::ConfigRejected(status) => write!(f, "CRTC configuration rejected (status {status})"),
        }
    }
}

impl std::error::Error for X11Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) => Some(e),
            Self::Connection(e) => Some(e),
            Self::Reply(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConnectError> for X11Error {
    fn from(e: ConnectError) -> Self {
        Self::Connect(e)
    }
}

impl From<ConnectionError> for X11Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

impl From<ReplyError> for X11Error {
    fn from(e: ReplyError) -> Self {
        Self::Reply(e)
    }
}
