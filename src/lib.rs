pub mod app;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod grade;
pub mod merge;
pub mod output;
pub mod paginator;
pub mod query;
pub mod runner;
pub mod sorter;

#[cfg(test)]
mod tests;
