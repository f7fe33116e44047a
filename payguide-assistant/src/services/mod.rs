pub mod document_cache;
pub mod github;
pub mod metrics;
pub mod pay_guide;
pub mod prompt;
pub mod providers;
