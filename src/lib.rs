//! partscan - electronic component recognition and inventory

pub mod classifier;
pub mod config;
pub mod recognition;
pub mod resistor;
pub mod storage;
pub mod vision;
