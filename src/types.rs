// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use log::debug;
use std::error;
use std::fmt;
use std::io;
use std::panic::RefUnwindSafe;
use std::sync::Arc;

/// Potential categories an error from this library falls into.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorKind {
    /// The caller supplied something that can't be turned into a metric.
    InvalidInput,
    /// A transport failure: DNS resolution, socket, connect, or write.
    IoError,
    /// The client was set up in a way that can never work, e.g. Telegraf
    /// formatted output combined with events or service checks.
    ConfigError,
    /// Data was discarded because a bounded queue was full.
    Overflow,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorKind::InvalidInput => "invalid input".fmt(f),
            ErrorKind::IoError => "I/O error".fmt(f),
            ErrorKind::ConfigError => "configuration error".fmt(f),
            ErrorKind::Overflow => "overflow".fmt(f),
        }
    }
}

/// Error generated by this library, potentially wrapping another
/// type of error (exposed via the `Error` trait).
///
/// Errors are cheap to clone so that a single transport failure can be
/// handed to the error handler and to every callback waiting on the
/// payload that failed.
#[derive(Debug, Clone)]
pub struct MetricError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithMessage(ErrorKind, String),
    IoError(Arc<io::Error>),
}

impl MetricError {
    /// Return the kind of the error
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::IoError(_) => ErrorKind::IoError,
            ErrorRepr::WithDescription(kind, _) => kind,
            ErrorRepr::WithMessage(kind, _) => kind,
        }
    }

    /// Return the wrapped I/O error, if this error came from a socket or
    /// resolver.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self.repr {
            ErrorRepr::IoError(ref err) => Some(&**err),
            _ => None,
        }
    }

    pub(crate) fn config(desc: &'static str) -> Self {
        MetricError::from((ErrorKind::ConfigError, desc))
    }

    pub(crate) fn invalid_input(message: String) -> Self {
        MetricError {
            repr: ErrorRepr::WithMessage(ErrorKind::InvalidInput, message),
        }
    }

    pub(crate) fn overflow(message: String) -> Self {
        MetricError {
            repr: ErrorRepr::WithMessage(ErrorKind::Overflow, message),
        }
    }
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            ErrorRepr::IoError(ref err) => err.fmt(f),
            ErrorRepr::WithDescription(_, desc) => desc.fmt(f),
            ErrorRepr::WithMessage(_, ref msg) => msg.fmt(f),
        }
    }
}

impl error::Error for MetricError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.repr {
            ErrorRepr::IoError(ref err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for MetricError {
    fn from(err: io::Error) -> MetricError {
        MetricError {
            repr: ErrorRepr::IoError(Arc::new(err)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for MetricError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> MetricError {
        MetricError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

/// Result type used throughout the library.
pub type MetricResult<T> = Result<T, MetricError>;

/// Completion callback attached to a single emitted metric.
///
/// The callback is invoked exactly once, from the background worker, with
/// the number of bytes written for the payload the metric was part of or
/// the error that prevented it from being written. The byte count is `0`
/// for mocked clients, for payloads queued while a TCP connection is being
/// re-established, and for metrics dropped by sampling.
pub type Callback = Box<dyn FnOnce(MetricResult<usize>) + Send + 'static>;

pub(crate) type ErrorHandler = Arc<dyn Fn(MetricError) + Sync + Send + RefUnwindSafe>;

/// Destination for failures that have no caller waiting on them.
///
/// Each failure event is handed to the configured handler exactly once.
/// Without a handler the error is logged and discarded.
#[derive(Clone, Default)]
pub(crate) struct ErrorReporter {
    handler: Option<ErrorHandler>,
}

impl ErrorReporter {
    pub(crate) fn new(handler: Option<ErrorHandler>) -> Self {
        ErrorReporter { handler }
    }

    pub(crate) fn report(&self, err: MetricError) {
        match self.handler {
            Some(ref handler) => handler(err),
            None => debug!("discarding metric error: {}", err),
        }
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("handler", &self.handler.as_ref().map(|_| "..."))
            .finish()
    }
}
