pub mod gate;

pub use gate::{PolicyGate, TOOL_NAMES};
