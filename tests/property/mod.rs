// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! - `topology_validation`: generated topologies and their cross-references
//! - `provisioning_fsm`: arbitrary input sequences against the run state machine

mod topology_validation;
