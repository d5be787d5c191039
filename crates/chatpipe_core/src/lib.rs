pub mod codegen;
pub mod cycle;
pub mod dataset;
pub mod executors;
pub mod guard;
pub mod history;
pub mod llm_protocol;
pub mod present;
pub mod session;
pub mod util;
