pub mod assets;
pub mod config;
pub mod logging;
pub mod notify;
pub mod retry;
pub mod service;
pub mod swap;
pub mod venue;
pub mod wallet;
