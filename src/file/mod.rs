/*!
The `file` module is for types and concepts strictly related to MIDI *files*.
These are kept separate from types and concepts that are also used in realtime
MIDI (`core`).
!*/

mod event;
mod header;

pub use event::{Event, EventKind};
pub use header::{Division, Format, FrameRate, Header, SmpteTiming};
