pub mod classifier;
pub mod config;
pub mod history;
pub mod interaction;
pub mod lifecycle;
pub mod loader;
pub mod selection;
pub mod session;
pub mod shortcuts;
pub mod toolbar;

pub use classifier::{MutationClassifier, MutationKind};
pub use config::{ConfigError, SessionConfig, ToolbarConfig};
pub use history::{
    History, HistoryStatus, RestoreOutcome, SaveCause, SaveOutcome, SkipReason,
};
pub use lifecycle::{Lifecycle, LifecycleError, Operation, SessionState};
pub use loader::{ContentLoader, DocumentFetcher, FetchError, LoadError, LoadReport, TemplateId};
pub use selection::Selection;
pub use session::{CanvasSession, SessionError, SessionNotice};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use toolbar::{ToolbarCoordinator, ToolbarPlacement, ToolbarSide};
