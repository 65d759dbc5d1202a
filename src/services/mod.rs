pub mod image_processor;
pub mod llm_service;
pub mod pipeline;
pub mod prompt_builder;
pub mod response_parser;
pub mod temp_store;
pub mod verdict;

pub use image_processor::ImageProcessor;
pub use llm_service::{GeminiService, GenerateRequest, GenerateResponse, ImageData, ModelGateway};
pub use pipeline::{GenerationSettings, RestorationPipeline};
pub use temp_store::{CleanupReport, ImageHandle, TempImageStore};
