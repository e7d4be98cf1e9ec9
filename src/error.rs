use crate::handler::HandlerError;
use snafu::Snafu;

/// The public Error type for this library.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

/// The public Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this library.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

/// The internal Error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum LibError {
    #[snafu(display("{}: expected chunk id '{}' but found '{}'", site, expected, found))]
    InvalidChunkId {
        site: String,
        expected: String,
        found: String,
    },

    #[snafu(display("{}: the file ended in the middle of the header chunk", site))]
    TruncatedHeader { site: String },

    #[snafu(display("{}: the file ended in the middle of a chunk header", site))]
    TruncatedChunk { site: String },

    #[snafu(display("{}: track data ended before the declared end of the track chunk", site))]
    TruncatedTrack { site: String },

    #[snafu(display(
        "{}: the stream ended in the middle of a variable-length quantity",
        site
    ))]
    TruncatedVarlen { site: String },

    #[snafu(display("{}: a variable-length quantity ran longer than four bytes", site))]
    InvalidVlq { site: String },

    #[snafu(display("{}: {}", site, description))]
    FormatViolation { site: String, description: String },

    #[snafu(display(
        "{}: data byte {:#04X} at offset {} with no running status in effect",
        site,
        byte,
        offset
    ))]
    UnexpectedDataByte { site: String, byte: u8, offset: u64 },

    #[snafu(display("{}: {}", site, description))]
    ArgumentOutOfRange { site: String, description: String },

    #[snafu(display("{}: a handler callback failed: {}", site, source))]
    Handler { site: String, source: HandlerError },

    #[snafu(display("{}: error while reading bytes: {}", site, source))]
    Io {
        site: String,
        source: crate::byte_source::ByteError,
    },

    #[snafu(display("{}: error while writing bytes: {}", site, source))]
    Write {
        site: String,
        source: std::io::Error,
    },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! io {
    () => {
        crate::error::IoSnafu { site: site!() }
    };
}

macro_rules! wr {
    () => {
        crate::error::WriteSnafu { site: site!() }
    };
}

/// Build and return a `FormatViolation` error.
macro_rules! violation {
    ($msg:expr) => {
        return crate::error::FormatViolationSnafu {
            site: site!(),
            description: String::from($msg),
        }
        .fail()
    };
    ($fmt:expr, $($arg:expr),+) => {
        return crate::error::FormatViolationSnafu {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
        .fail()
    };
}

/// Build and return an `ArgumentOutOfRange` error.
macro_rules! badarg {
    ($fmt:expr, $($arg:expr),+) => {
        return Err(crate::Error::from(
            crate::error::ArgumentOutOfRangeSnafu {
                site: site!(),
                description: format!($fmt, $($arg),+),
            }
            .build(),
        ))
    };
}

/// Unwrap a `ByteResult`, mapping `End` to the given truncation error kind and
/// an oversized VLQ to `InvalidVlq`. Everything else is an io error.
macro_rules! trunc {
    ($result:expr, $variant:ident) => {
        match $result {
            Ok(value) => value,
            Err(crate::byte_source::ByteError::End { .. }) => {
                return crate::error::$variant { site: site!() }.fail()
            }
            Err(crate::byte_source::ByteError::VlqTooBig { .. }) => {
                return crate::error::InvalidVlqSnafu { site: site!() }.fail()
            }
            Err(e) => return Err(e).context(crate::error::IoSnafu { site: site!() }),
        }
    };
}

#[test]
fn site_test() {
    let line = line!() + 1;
    let site = site!();
    assert!(site.contains("error.rs"));
    assert!(site.contains(format!("{}", line).as_str()));
}

#[test]
fn violation_macro_test() {
    fn foo() -> LibResult<u64> {
        violation!("track {} is one too many", 17);
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", crate::Error::from(result.err().unwrap()));
    assert!(message.contains("track 17 is one too many"));
}
