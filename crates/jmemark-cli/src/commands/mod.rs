pub mod check;
pub mod compare;
pub mod init;
pub mod mark;
pub mod validate;
