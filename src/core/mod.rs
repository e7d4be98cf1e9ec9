/*!
The `core` module is for types and concepts that are *not* strictly related to
MIDI *files*. These types and concepts could be used for realtime MIDI as well.
!*/

pub mod bew;
mod status;
pub mod vlq;

pub use status::StatusType;
pub use vlq::Vlq;
