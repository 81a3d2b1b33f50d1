//! declcfg CLI - build and inspect declarative operator catalogs.

pub mod commands;
