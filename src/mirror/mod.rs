pub mod archive;
pub mod audit;
pub mod client;
pub mod comments;
pub mod config;
pub mod filter;
pub mod git;
pub mod item;
pub mod ledger;
pub mod lock;
pub mod paths;
pub mod pipeline;
pub mod robots;
pub mod site;
pub mod urls;
pub mod util;
pub mod warn;
