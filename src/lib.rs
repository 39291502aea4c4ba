// Library surface so the session logic can be driven headlessly by
// integration tests and reused outside the binary.

pub mod app;
pub mod overlay;
pub mod player;
pub mod session;
pub mod sink;
pub mod state;
