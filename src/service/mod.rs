pub mod decision_engine;
pub mod dispatcher;
pub mod extraction;
pub mod openai_service;
pub mod pipeline;
pub mod rule_extractor;
pub mod timezone;
