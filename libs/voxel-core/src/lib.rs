pub mod collect;
pub mod config;
pub mod dispatch;
pub mod docker;
pub mod error;
pub mod executor;
pub mod job;
pub mod registry;

// Re-export commonly used types for convenience
pub use config::Config;
pub use dispatch::{Dispatcher, InferenceResult};
pub use error::DispatchError;
pub use registry::{ModelDescriptor, ModelRegistry};
