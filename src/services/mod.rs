//! File and format services used by the visualizer

pub mod format;
pub mod io;
pub mod output;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use output::{OutputKind, OutputWriter};
