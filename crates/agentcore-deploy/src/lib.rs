//! agentcore-deploy - resource lifecycle for an AgentCore multi-agent system
//!
//! Deploys, tears down and reports on the runtime, gateway, functions,
//! identity pools, roles, knowledge base, storage bucket and memory of one
//! project. Provisioned identifiers are kept in a parameter-store registry.

pub mod aws;
pub mod cli;
pub mod config;
pub mod handler;
pub mod orchestrator;
pub mod registry;
pub mod wait;
