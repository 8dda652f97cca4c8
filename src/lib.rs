pub mod cli;
pub mod config;
pub mod controller;
pub mod domain;
pub mod forecast;
pub mod optimizer;
pub mod peak_trigger;
pub mod runtime;
pub mod telemetry;
