//! LineageFlow extracts data-lineage metadata from ETL package definitions
//! and assembles it into a queryable directed graph.

pub mod commands;
pub mod display;
pub mod lineage_engine;
