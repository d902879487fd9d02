//! PriceSignal Core — indicators, labels, signal classifier, data plumbing.
//!
//! - Domain types (price points, feature rows, signals)
//! - Rolling range normalization and log-linear price projection
//! - Forward-return labeling without lookahead leakage
//! - Random-forest signal classifier with chronological cross-validation
//! - Price history retrieval and CSV persistence
//! - Trade intents and the brokerage gateway

pub mod broker;
pub mod config;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod labels;
pub mod model;
pub mod rng;
