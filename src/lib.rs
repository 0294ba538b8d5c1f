pub mod constants;
pub mod config;
pub mod error;
pub mod log;

pub mod utils;
pub mod cli;
pub mod session;
pub mod bus;

pub mod base_props;
pub mod rgb2gray;
pub mod tutorials;
