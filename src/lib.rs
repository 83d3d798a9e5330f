//! Field-service task tracking: a synced local cache of remote task
//! documents, an evidence-guarded status workflow and SLA reminders.

pub mod app;
pub mod blob;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod listing;
pub mod logging;
pub mod notify;
pub mod observe;
pub mod remote;
pub mod report;
pub mod store;
pub mod sync;
pub mod ui;
pub mod view_state;
pub mod workflow;

#[cfg(test)]
mod testing;
