pub mod db;
pub mod init;
pub mod serve;
pub mod user;
