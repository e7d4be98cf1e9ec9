/*!
A streaming codec for Standard MIDI Files (formats 0, 1 and 2).

The crate decodes and encodes the `MThd`/`MTrk` chunk structure, including
variable-length quantities, running status, multi-packet system exclusive
messages and every meta event, through three cooperating pieces:

- [`Parser`] pulls bytes from any `Read + Seek` source and drives an
  [`EventHandler`] with lifecycle callbacks and one call per decoded event.
- [`Writer`] is the symmetric encoder: the same handler interface, producing
  a byte-exact file (it also works as a plain builder API).
- [`Sequence`] collects a whole file into a time-indexed container, with
  wall-clock times integrated from the tempo map.

```no_run
use smf_stream::Sequence;

let sequence = Sequence::from_file("song.mid").unwrap();
for timed in sequence.sysex_events(None) {
    println!("sysex of {} bytes at {:.3}s", timed.event().data().len() + 1, timed.seconds());
}
```

Handlers that prefer notes and tempos over raw byte payloads can wrap a
[`MessageHandler`] in a [`DispatchingHandler`].
!*/

// https://www.music.mcgill.ca/~gary/306/week9/smf.html

#[macro_use]
mod error;

mod byte_source;
pub mod constants;
mod convert;
pub mod core;
mod dispatch;
pub mod file;
mod handler;
mod parser;
mod sequence;
mod text;
mod writer;

pub use convert::write_type0;
pub use dispatch::{DispatchingHandler, MessageHandler};
pub use error::{Error, Result};
pub use handler::{EventHandler, HandlerError, HandlerResult, NullHandler};
pub use parser::{parse, parse_file, Parser, ParserSettings};
pub use sequence::{Sequence, SequenceBuilder, TimedEvent};
pub use text::Text;
pub use writer::Writer;
