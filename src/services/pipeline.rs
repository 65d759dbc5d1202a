// src/services/pipeline.rs
//! The three restoration stages. Each is one model round-trip; all state a
//! stage needs arrives through its arguments.

use crate::errors::RestorationError;
use crate::models::{AnalysisResult, RestorationRequest, ValidationResult, Verdict};
use crate::services::image_processor::ImageProcessor;
use crate::services::llm_service::{GenerateRequest, GenerateResponse, ImageData, ModelGateway};
use crate::services::prompt_builder::{self, PromptContext};
use crate::services::response_parser;
use crate::services::temp_store::{CleanupReport, ImageHandle, TempImageStore};
use crate::services::verdict;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Upper bound on a single model call.
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 2048,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub analysis: AnalysisResult,
    /// Stored original, kept for the validate stage.
    pub original: ImageHandle,
}

#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub image: ImageData,
    /// Stored restored image, kept for the validate stage.
    pub restored: ImageHandle,
}

#[derive(Debug, Clone)]
pub struct ValidateOutcome {
    pub validation: ValidationResult,
    pub verdict: Verdict,
}

pub struct RestorationPipeline {
    gateway: Arc<dyn ModelGateway>,
    store: Arc<TempImageStore>,
    processor: ImageProcessor,
    settings: GenerationSettings,
}

impl RestorationPipeline {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        store: Arc<TempImageStore>,
        processor: ImageProcessor,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            processor,
            settings,
        }
    }

    pub fn model_name(&self) -> &str {
        self.gateway.model_name()
    }

    /// Stage 1. The original is stored only once the model call succeeds.
    pub async fn analyze(
        &self,
        image_bytes: &[u8],
        mime_type: Option<&str>,
    ) -> Result<AnalyzeOutcome, RestorationError> {
        info!("Stage 1: analysis request received");
        let image = self.processor.prepare(image_bytes, mime_type)?;

        let response = self
            .call(vec![image.clone()], prompt_builder::build(PromptContext::Analyze))
            .await
            .inspect_err(|e| error!("Analysis failed: {}", e))?;

        let staged = self.store.stage(&image, None).await?;
        let analysis = response_parser::parse_analysis(response.text());
        info!(
            "Analysis completed: {} defect(s), condition {}",
            analysis.defects.len(),
            analysis.overall_condition
        );

        Ok(AnalyzeOutcome {
            analysis,
            original: staged.persist(),
        })
    }

    /// Stage 2. Fails unless the model answers with an image.
    pub async fn restore(
        &self,
        image_bytes: &[u8],
        mime_type: Option<&str>,
        request: &RestorationRequest,
    ) -> Result<RestoreOutcome, RestorationError> {
        info!("Stage 2: restoration request received");
        let image = self.processor.prepare(image_bytes, mime_type)?;

        let selected: Vec<_> = request
            .effective_defects()
            .into_iter()
            .map(|d| d.as_str())
            .collect();
        info!(
            "Restoring {:?} (enhance colors: {}, preserve original: {}, analysis: {})",
            selected,
            request.enhance_colors,
            request.preserve_original,
            request.analysis.is_some()
        );

        let instruction = prompt_builder::build(PromptContext::Restore(request));
        let response = self
            .call(vec![image], instruction)
            .await
            .inspect_err(|e| error!("Restoration failed: {}", e))?;

        let restored = response.into_first_image().ok_or_else(|| {
            error!("Restoration failed: response contained no image");
            RestorationError::MissingImage("response contained no image attachment".to_string())
        })?;

        let staged = self.store.stage(&restored, Some("restored")).await?;
        info!("Restoration completed: {}", staged.handle());

        Ok(RestoreOutcome {
            restored: staged.persist(),
            image: restored,
        })
    }

    /// Stage 3. Both stored images are removed once a verdict exists; a
    /// failed model call leaves them for a retry.
    pub async fn validate(
        &self,
        original: &ImageHandle,
        restored: &ImageHandle,
        analysis: Option<&AnalysisResult>,
    ) -> Result<ValidateOutcome, RestorationError> {
        info!("Stage 3: validation request received");
        let original_image = self.store.load(original).await?;
        let restored_image = self.store.load(restored).await?;

        let inventory = analysis.and_then(|a| a.element_inventory.as_ref());
        let instruction = prompt_builder::build(PromptContext::Validate { inventory });

        let response = self
            .call(vec![original_image, restored_image], instruction)
            .await
            .inspect_err(|e| error!("Validation failed: {}", e))?;

        let validation = response_parser::parse_validation(response.text());

        self.store.remove(original).await;
        self.store.remove(restored).await;

        let verdict = verdict::decide(&validation);
        info!(
            "Validation completed: {} (fidelity {})",
            verdict.overall_result, validation.fidelity_score
        );

        Ok(ValidateOutcome {
            validation,
            verdict,
        })
    }

    /// Sweep stored images older than `max_age`. The window never drops
    /// below the model timeout, so files written by a run still in progress
    /// survive.
    pub async fn cleanup(&self, max_age: Duration) -> CleanupReport {
        let max_age = max_age.max(self.settings.timeout);
        self.store.cleanup(max_age).await
    }

    async fn call(
        &self,
        images: Vec<ImageData>,
        instruction: String,
    ) -> Result<GenerateResponse, RestorationError> {
        let request = GenerateRequest {
            images,
            instruction,
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
        };

        tokio::time::timeout(self.settings.timeout, self.gateway.generate(request))
            .await
            .map_err(|_| {
                RestorationError::Gateway(format!(
                    "model call timed out after {}s",
                    self.settings.timeout.as_secs_f32()
                ))
            })?
    }
}
