#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use photo_restoration::errors::RestorationError;
use photo_restoration::services::{
    GenerateRequest, GenerateResponse, GenerationSettings, ImageData, ImageProcessor,
    ModelGateway, RestorationPipeline, TempImageStore,
};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub enum Reply {
    Respond(GenerateResponse),
    Delayed(Duration, GenerateResponse),
    Fail(String),
    Hang,
}

/// Model double that plays back queued replies and records every request.
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResponse, RestorationError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Reply::Fail(message)) => Err(RestorationError::Gateway(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(RestorationError::Gateway("no scripted reply left".into())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub gateway: Arc<ScriptedGateway>,
    pub pipeline: Arc<RestorationPipeline>,
}

impl Harness {
    pub async fn new(replies: Vec<Reply>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TempImageStore::open(dir.path()).await.unwrap());
        let gateway = ScriptedGateway::new(replies);
        let pipeline = Arc::new(RestorationPipeline::new(
            gateway.clone(),
            store,
            ImageProcessor::new(4096),
            GenerationSettings {
                timeout: Duration::from_millis(200),
                ..GenerationSettings::default()
            },
        ));
        Self {
            dir,
            gateway,
            pipeline,
        }
    }

    pub fn stored_files(&self) -> Vec<String> {
        file_names(self.dir.path())
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut output = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .unwrap();
    output
}

pub fn text_response(body: &str) -> GenerateResponse {
    GenerateResponse {
        text: Some(body.to_string()),
        attachments: Vec::new(),
    }
}

pub fn text(body: &str) -> Reply {
    Reply::Respond(text_response(body))
}

pub fn restored_image() -> Reply {
    Reply::Respond(GenerateResponse {
        text: None,
        attachments: vec![ImageData::new(png(3, 3), "image/png")],
    })
}

pub const ANALYSIS_REPLY: &str = r#"Analysis follows.
{
  "defects": [
    {"type": "SCRATCHES", "severity": "MEDIUM", "description": "diagonal scratch", "estimatedFixTime": "QUICK"},
    {"type": "TEARS_FOLDS", "severity": "HIGH", "description": "fold across top", "estimatedFixTime": "COMPLEX"}
  ],
  "overallCondition": "FAIR",
  "recommendations": ["repair fold first"],
  "colorAnalysis": {"saturationLevel": "LOW", "contrastLevel": "LOW", "whiteBalance": "WARM", "colorCast": "YELLOW"},
  "elementInventory": {
    "people": [{"count": 2, "description": "two sisters in dresses"}],
    "objects": [{"type": "chair", "description": "wicker chair", "count": 1}],
    "backgroundElements": [{"type": "wall", "description": "brick wall", "prominentFeatures": ["window"]}],
    "composition": {"framing": "full length", "perspective": "eye level", "keyElements": ["sisters", "chair"]}
  }
}"#;

pub const PASSING_VALIDATION: &str = r#"{
  "hasAddedElements": "NO",
  "hasRemovedElements": "NO",
  "hasAlteredFaces": "NO",
  "hasChangedComposition": "NO",
  "fidelityScore": "88",
  "elementComparison": {
    "peopleCount": {"original": 2, "restored": 2, "match": true},
    "objectsCount": {"original": 1, "restored": 1, "match": true},
    "addedElements": [],
    "removedElements": [],
    "alteredElements": []
  },
  "issuesFound": [],
  "validationPassed": "YES"
}"#;
