//! Configuration, content loading, and the tick driver for TDRS.
//!
//! This crate turns files on disk into a running social simulation:
//! YAML configuration and content are parsed into the constructors that
//! `tdrs-social` exposes, and [`Simulation`] advances the resulting engine
//! one tick at a time.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `tdrs-config.yaml` into
//!   strongly-typed structs.
//! - [`content`] -- Trait, rule, schema, and scenario definitions
//!   ([`Content`]).
//! - [`simulation`] -- Named entities, scenario population, and the tick
//!   loop ([`Simulation`]).
//!
//! [`Content`]: content::Content
//! [`Simulation`]: simulation::Simulation

pub mod config;
pub mod content;
pub mod simulation;
