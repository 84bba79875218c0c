// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors surfaced by session and orientation operations.

use alloc::string::String;
use core::fmt;

use crate::modeline::TimingError;

/// Errors from [`CrtSession`](crate::session::CrtSession) and
/// [`orientation`](crate::orientation) operations.
///
/// `E` is the display server's error type. A disconnected output is not an
/// error (it is skipped and traced), and selecting every output when none is
/// connected succeeds without doing anything.
#[derive(Debug)]
pub enum SwitchError<E> {
    /// The display server could not be reached. Nothing was changed.
    Connection(E),
    /// The requested timing could not be synthesized. Nothing was changed.
    Timing(TimingError),
    /// A specific output index is not in the server's output list.
    UnknownOutput {
        /// Requested index.
        index: u32,
        /// Number of outputs the server reported.
        available: usize,
    },
    /// The server refused to register a mode.
    ModeRejected {
        /// Name of the refused mode.
        name: String,
        /// Server error.
        source: E,
    },
    /// Any other failed request. Earlier changes are not rolled back.
    Server(E),
}

impl<E> From<TimingError> for SwitchError<E> {
    fn from(e: TimingError) -> Self {
        Self::Timing(e)
    }
}

impl<E: fmt::Display> fmt::Display for SwitchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "cannot connect to display server: {e}"),
            Self::Timing(e) => write!(f, "{e}"),
            Self::UnknownOutput { index, available } => {
                write!(f, "output {index} does not exist ({available} outputs)")
            }
            Self::ModeRejected { name, source } => {
                write!(f, "display server rejected mode {name}: {source}")
            }
            Self::Server(e) => write!(f, "display server request failed: {e}"),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for SwitchError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Connection(e) | Self::Server(e) | Self::ModeRejected { source: e, .. } => {
                Some(e)
            }
            Self::Timing(e) => Some(e),
            Self::UnknownOutput { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[derive(Debug)]
    struct Refused;

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("BadValue")
        }
    }

    impl core::error::Error for Refused {}

    #[test]
    fn messages_name_the_failure() {
        let e: SwitchError<Refused> = SwitchError::ModeRejected {
            name: "CRT2".into(),
            source: Refused,
        };
        assert_eq!(e.to_string(), "display server rejected mode CRT2: BadValue");

        let e: SwitchError<Refused> = SwitchError::UnknownOutput {
            index: 20,
            available: 3,
        };
        assert_eq!(e.to_string(), "output 20 does not exist (3 outputs)");
    }

    #[test]
    fn source_chains_to_server_error() {
        use core::error::Error;

        let e: SwitchError<Refused> = SwitchError::Server(Refused);
        assert!(e.source().is_some());
        let e: SwitchError<Refused> = SwitchError::UnknownOutput {
            index: 0,
            available: 0,
        };
        assert!(e.source().is_none());
    }
}
