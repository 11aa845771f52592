pub mod access;
pub mod cleanup;
pub mod cli;
pub mod command;
pub mod config;
pub mod defaults;
pub mod k8s;
pub mod logging;
pub mod poll;
pub mod provisioner;
pub mod scenario;
pub mod verifier;
