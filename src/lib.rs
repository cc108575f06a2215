pub mod actors;
pub mod config;
pub mod media_header;
pub mod report_builder;
pub mod reorder_buffer;
pub mod source_registry;
pub mod source_validator;
