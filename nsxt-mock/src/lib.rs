pub mod error;
pub mod fake;
pub mod rest;
pub mod state;

pub use error::StoreError;
pub use fake::{InMemoryApi, Operation};
pub use rest::{AppState, create_router};
pub use state::ManagerState;
