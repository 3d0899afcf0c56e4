pub mod guards;
pub mod hybrid;
pub mod report;
pub mod rerank;
pub mod search;
pub mod tokenizer;
