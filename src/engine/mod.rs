// control-domain half of the engine: everything here runs on the main
// thread and talks to the render side only through AudioCommands

pub mod autogen;
pub mod scheduler;
pub mod sequence;
pub mod state;
