//! Request handlers.

pub mod artifacts;
pub mod health;
pub mod jobs;
pub mod stages;
pub mod videos;

pub use artifacts::*;
pub use health::*;
pub use jobs::*;
pub use stages::*;
pub use videos::*;
