// Command lifecycle state machine
//
// Commands move Pending -> Executing -> {Completed | Failed}. The dispatcher is
// the only writer; transitions are checked here so an out-of-order write is
// reported instead of silently corrupting the lifecycle.

pub mod states;

pub use states::{CommandStatus, Priority};
