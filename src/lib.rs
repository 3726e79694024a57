pub mod constants;
pub mod config;
pub mod position;
pub mod eligibility;
pub mod selector;
pub mod settime;
pub mod oracle;
pub mod sim;
pub mod feed;
pub mod tracking;
pub mod input;
pub mod feedback;
pub mod control;
