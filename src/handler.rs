//! The handler contract: the polymorphic sink the parser drives. A handler
//! receives lifecycle callbacks in file order and may keep whatever state it
//! likes, but must not drive the parser reentrantly. Every callback has a
//! no-op default, so an implementation only overrides what it cares about.

use crate::file::{Event, Header};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// An error returned from a handler callback. The parser surfaces these as
/// [`crate::Error`] in both strict and lenient modes.
#[derive(Debug)]
pub struct HandlerError(Box<dyn Error + Send + Sync + 'static>);

impl HandlerError {
    pub fn new<E: Into<Box<dyn Error + Send + Sync + 'static>>>(inner: E) -> Self {
        Self(inner.into())
    }
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl From<crate::Error> for HandlerError {
    fn from(e: crate::Error) -> Self {
        Self::new(e)
    }
}

/// The result type for handler callbacks.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// The sink for parsing events. The parser calls these methods in file
/// order: `header`, then for each track `reset_ticks`, `start_of_track`, a
/// mix of `update_ticks` and event callbacks, `end_of_track`, and finally
/// `eof` once all chunks are exhausted.
///
/// Events pass by value; the parser retains nothing after dispatch.
pub trait EventHandler {
    /// The `MThd` chunk has been read.
    fn header(&mut self, header: &Header) -> HandlerResult {
        let _ = header;
        Ok(())
    }

    /// Time returns to zero at the start of a track.
    fn reset_ticks(&mut self) -> HandlerResult {
        Ok(())
    }

    /// `delta_ticks` have elapsed since the previous event in this track.
    /// Only called with a nonzero delta.
    fn update_ticks(&mut self, delta_ticks: u32) -> HandlerResult {
        let _ = delta_ticks;
        Ok(())
    }

    /// An `MTrk` chunk has opened.
    fn start_of_track(&mut self, track: u16) -> HandlerResult {
        let _ = track;
        Ok(())
    }

    /// The end-of-track meta event was seen (or, in lenient mode,
    /// synthesized because it was missing).
    fn end_of_track(&mut self, track: u16) -> HandlerResult {
        let _ = track;
        Ok(())
    }

    /// A channel voice message.
    fn channel_message(&mut self, event: Event) -> HandlerResult {
        let _ = event;
        Ok(())
    }

    /// A complete system exclusive message. Split messages are reassembled
    /// before delivery and the payload always ends with `0xF7`.
    fn sysex_message(&mut self, event: Event) -> HandlerResult {
        let _ = event;
        Ok(())
    }

    /// An escape sequence (`F7`-prefixed raw bytes).
    fn escape_sequence(&mut self, event: Event) -> HandlerResult {
        let _ = event;
        Ok(())
    }

    /// A meta event.
    fn meta_message(&mut self, event: Event) -> HandlerResult {
        let _ = event;
        Ok(())
    }

    /// A system common or real time status that should not occur in a file.
    fn invalid_message(&mut self, event: Event) -> HandlerResult {
        let _ = event;
        Ok(())
    }

    /// All chunks have been consumed.
    fn eof(&mut self) -> HandlerResult {
        Ok(())
    }
}

/// Handles every event by doing nothing. A base for handlers that only care
/// about a few callbacks, and a stand-in wherever a handler is required but
/// nothing needs to be collected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NullHandler;

impl EventHandler for NullHandler {}

// A mutable reference to a handler is itself a handler, so a caller can keep
// ownership while the parser borrows it. Every method forwards; relying on
// the defaults here would silently drop callbacks.
impl<H: EventHandler + ?Sized> EventHandler for &mut H {
    fn header(&mut self, header: &Header) -> HandlerResult {
        (**self).header(header)
    }

    fn reset_ticks(&mut self) -> HandlerResult {
        (**self).reset_ticks()
    }

    fn update_ticks(&mut self, delta_ticks: u32) -> HandlerResult {
        (**self).update_ticks(delta_ticks)
    }

    fn start_of_track(&mut self, track: u16) -> HandlerResult {
        (**self).start_of_track(track)
    }

    fn end_of_track(&mut self, track: u16) -> HandlerResult {
        (**self).end_of_track(track)
    }

    fn channel_message(&mut self, event: Event) -> HandlerResult {
        (**self).channel_message(event)
    }

    fn sysex_message(&mut self, event: Event) -> HandlerResult {
        (**self).sysex_message(event)
    }

    fn escape_sequence(&mut self, event: Event) -> HandlerResult {
        (**self).escape_sequence(event)
    }

    fn meta_message(&mut self, event: Event) -> HandlerResult {
        (**self).meta_message(event)
    }

    fn invalid_message(&mut self, event: Event) -> HandlerResult {
        (**self).invalid_message(event)
    }

    fn eof(&mut self) -> HandlerResult {
        (**self).eof()
    }
}
