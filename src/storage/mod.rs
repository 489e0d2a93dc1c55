//! Local persistence: saved recordings and UI preferences

pub mod sink;
pub mod theme;

pub use sink::{ArtifactSink, FileSink};
pub use theme::{JsonStore, Theme, ThemeStore};
