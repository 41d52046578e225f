pub mod attachment;
pub mod config;
pub mod decode;
pub mod error;
pub mod link;
pub mod merge;
pub mod model;
pub mod multipart;
pub mod normalize;
pub mod portal;
pub mod processor;
pub mod upload;

pub use config::{PortalConfig, Session};
pub use portal::PortalClient;
pub use processor::{DataProcessor, HostShell, PostRequest};
pub use upload::ProgressListener;

pub use error::Error;
pub use error::PortalError;
pub use error::PortalErrorKind;
