#![forbid(unsafe_code)]

//! Headless player for the abuse detection/prevention walkthrough.

pub mod cli;
pub mod player;
pub mod walkthrough;
