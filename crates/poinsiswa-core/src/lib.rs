//! Core library for the Poin Siswa school point ledger.
//!
//! Teachers record violations and achievements for the students of their
//! classroom; students read their own tallies; administrators see
//! school-wide figures. Everything goes through [`ledger::PointLedger`],
//! which checks every call against the access policy and keeps each
//! student's running totals consistent with the event log.
//!
//! # Modules
//!
//! - [`models`]: profiles, classrooms, students, point events
//! - [`policy`]: the access policy gate and route guard
//! - [`ledger`]: the point ledger service
//! - [`store`]: storage backends (in-memory and hosted REST)
//! - [`api`]: HTTP client for the hosted backend
//! - [`auth`]: sessions and the signed-in caller
//! - [`advice`]: follow-up advice for recorded events
//! - [`config`]: configuration file and environment
//! - [`utils`]: formatting helpers

pub mod advice;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod policy;
pub mod store;
pub mod utils;

pub use error::{AuthFailure, LedgerError, LedgerResult};
pub use ledger::PointLedger;
