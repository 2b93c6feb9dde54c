pub mod check;
pub mod daemon;
pub mod init;
pub mod status;
