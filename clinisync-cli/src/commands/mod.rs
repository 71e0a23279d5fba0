pub mod daemon;
pub mod init;
pub mod preview;
pub mod sync;
