pub mod app;
pub mod config;
pub mod errors;
pub mod export;
pub mod fields;
pub mod handlers;
pub mod models;
pub mod roster;
pub mod state;
pub mod stats;
pub mod storage;
pub mod validation;
pub mod week;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::{Store, open_store};
pub use week::{WeekCollection, WeekLifecycle};
