pub mod engine;
pub mod hit;
pub mod scene;

pub use engine::SceneEngine;
pub use hit::{hit_test, hit_test_rect};
pub use scene::{SceneGraph, SceneNode};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
