pub mod init;
pub mod sub;
pub mod sync;
pub mod profile;
