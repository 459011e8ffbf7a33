/*!
 * Render Module
 * Single-line terminal status display
 */

pub mod status;

pub use status::StatusRenderer;
pub(crate) use status::restore_terminal;
