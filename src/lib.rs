//! dbkeeper - rolling dump backups and confirmed restores for one remote database
//!
//! `backup` streams a dump from the remote host into a timestamped local
//! artifact and prunes old ones; `restore` stages a chosen artifact on the
//! host, restores it and removes the staged copy.

pub mod artifact;
pub mod backup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod interrupt;
pub mod observability;
pub mod remote;
pub mod restore;
pub mod retention;
