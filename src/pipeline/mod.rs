pub mod dispatcher;
pub mod error;
pub mod extraction;
pub mod persistence;
pub mod prompt_templates;
pub mod registry;
pub mod storage;

pub use dispatcher::{build_dispatcher, BuildError, UploadDispatcher, UploadRequest};
pub use error::PipelineError;
pub use registry::{Persistence, Registry, RegistryEntry};
