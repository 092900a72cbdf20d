pub mod image_parsing;
pub mod llm_instructions;
pub mod pdf_ingestion;
