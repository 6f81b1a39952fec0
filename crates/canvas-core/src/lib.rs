pub mod engine;
pub mod error;
pub mod events;
pub mod id;
pub mod model;
pub mod snapshot;
pub mod template;

pub use engine::{CanvasEngine, ElementIds, EngineEvent, EngineEventKind, ZOrder};
pub use error::{EngineError, TemplateError, WireError};
pub use events::{Disposer, EventBus, Subscription};
pub use id::ElementId;
pub use model::*;
pub use snapshot::Snapshot;
pub use template::{NormalizeReport, Template};

// Re-export geometry types so downstream crates share one kurbo version
pub use kurbo::{Affine, Point, Rect, Vec2};
