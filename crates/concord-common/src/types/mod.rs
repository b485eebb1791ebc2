//! Core records for Concord

pub mod contribution;
pub mod report;
pub mod strategy;
