// Library entrypoint for integration tests and the server binary.
pub mod api;
pub mod assistant;
pub mod config;
pub mod schemas;
pub mod shutdown;
pub mod state;
pub mod storage;

pub use api::build_router;
pub use config::{bind_address, load_config, Config};
pub use state::AppState;
