//! CLI commands implementation

pub mod crawl;
pub mod init;
pub mod search;
pub mod status;

pub use crawl::*;
pub use init::*;
pub use search::*;
pub use status::*;
