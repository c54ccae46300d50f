//! Protocol constants for the photo hand-off exchange

/// The only defined client command.
pub const CMD_TAKE_PHOTO: &str = "TAKE_PHOTO";

/// Reserved token sent in the name slot when capture failed and no
/// payload will follow.
pub const NO_PHOTO: &str = "NO_PHOTO";

/// Terminator for text tokens (command, name, size, echoes).
pub const TOKEN_DELIMITER: u8 = b'\n';

/// Default cap on a single text token.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Default per-read/per-write cap for payload bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Hard safety limit on a declared photo size.
pub const MAX_PHOTO_SIZE: u64 = 256 * 1024 * 1024; // 256MB
