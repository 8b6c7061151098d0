pub mod agents;
pub mod cli;
pub mod config;
pub mod context;
pub mod doctor;
pub mod error;
pub mod naming;
pub mod openai;
pub mod pipeline;
pub mod profiles;
pub mod provider;
pub mod runner;
pub mod telemetry;
