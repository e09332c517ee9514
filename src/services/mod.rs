pub mod difficulty;
pub mod generative;
pub mod grading;
pub mod level_config;
pub mod llm_provider;
pub mod practice;
pub mod prefetch;
pub mod problem;
pub mod session_store;
pub mod synthesizer;
pub mod tutor;
