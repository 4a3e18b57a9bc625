//! ClassDesk · teacher dashboard backend
//!
//! Data layer and HTTP surface for a K-12 teacher dashboard: students,
//! classrooms, activity logs, access codes, authored learning content and a
//! timed quiz runner. Every collection is read through a remote table with a
//! local JSON cache underneath; see `sync`.

pub mod access_codes;
pub mod config;
pub mod content;
pub mod csv;
pub mod domain;
pub mod error;
pub mod listing;
pub mod notify;
pub mod protocol;
pub mod remote;
pub mod routes;
pub mod rows;
pub mod runner;
pub mod seeds;
pub mod settings;
pub mod state;
pub mod storage;
pub mod sync;
pub mod teacher_data;
pub mod telemetry;
pub mod util;
