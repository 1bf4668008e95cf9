// Shared byte-level helpers
pub mod bytes;
pub mod encoding;
pub mod guid;
pub mod io;

pub use guid::Guid;
pub use io::Reader;
