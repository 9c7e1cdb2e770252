pub mod access;
pub mod assignments;
pub mod config;
pub mod db;
pub mod enrollment;
pub mod error;
pub mod identity;
pub mod ipc;
pub mod model;
pub mod submissions;
pub mod temporal;
