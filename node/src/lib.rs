// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod events;
pub mod store;
pub mod cache;
pub mod projection;
pub mod notify;
pub mod engine;
pub mod api;
pub mod server;
