pub mod board;
pub mod db;
pub mod notify;
pub mod remote;
pub mod session;
pub mod workflow;
