//! Job Tracker: finds job-application confirmations in a mailbox and
//! exports them as a spreadsheet.

pub mod boundary;
pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod mail;
pub mod pipeline;
