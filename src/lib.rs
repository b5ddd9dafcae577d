pub mod args;
pub mod backend;
pub mod errors;
pub mod fix;
pub mod gomod;
pub mod graph;
pub mod history;
pub mod ignore;
#[cfg(test)]
mod mock;
pub mod nancy;
pub mod oracle;
pub mod orchestrator;
pub mod report;
pub mod strategy;
pub mod version;
