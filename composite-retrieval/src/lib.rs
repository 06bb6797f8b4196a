pub mod ambient;

pub use ambient::{ambient_recall, AmbientRecallResponse, LayerHealth, MemoryHealth, RenderedItem};
