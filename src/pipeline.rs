//! The extraction pipeline: recognize text in an image, then structure it.
//!
//! Each image moves through `Recognizing → Structuring → Done`, and any stage
//! may instead end in `Empty`. Only a missing image file or a recognizer
//! failure is reported as an error, and
//! [`Pipeline::process_multiple_images`] logs those and carries on, so that
//! one bad image never stops the rest of the batch. Callers who need to know
//! why an image came up empty can install a [`ReportHandler`].

use std::{io, sync::Arc};

use crate::{
    agent::StructuringAgent, prelude::*, product::ProductRecord,
    recognizers::TextRecognizer,
};

/// Where an image is in the pipeline.
#[derive(Debug)]
enum ImageStage {
    Recognizing,
    Structuring { raw_text: String },
    Done(Vec<ProductRecord>),
    Empty(EmptyReason),
}

/// Why an image produced no records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmptyReason {
    /// The recognizer found no text.
    NoText,

    /// The agent found no products in the text.
    NoProducts,

    /// The image could not be processed.
    Failed(String),
}

/// The terminal state of one image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageOutcome {
    Done(Vec<ProductRecord>),
    Empty(EmptyReason),
}

/// What happened to one image.
#[derive(Clone, Debug)]
pub struct ImageReport {
    /// The image path.
    pub path: PathBuf,

    /// How processing ended.
    pub outcome: ImageOutcome,
}

impl ImageReport {
    /// The records extracted from this image.
    pub fn records(&self) -> &[ProductRecord] {
        match &self.outcome {
            ImageOutcome::Done(records) => records,
            ImageOutcome::Empty(_) => &[],
        }
    }
}

/// Receives the report for each image as soon as it is finished.
pub type ReportHandler = Box<dyn Fn(ImageReport) + Send + Sync>;

/// Recognizes and structures leaflet images, one at a time.
pub struct Pipeline {
    recognizer: Arc<dyn TextRecognizer>,
    agent: StructuringAgent,
    on_report: Option<ReportHandler>,
}

impl Pipeline {
    /// Create a new pipeline.
    pub fn new(recognizer: Arc<dyn TextRecognizer>, agent: StructuringAgent) -> Self {
        Self {
            recognizer,
            agent,
            on_report: None,
        }
    }

    /// Call `handler` with an [`ImageReport`] for every image we process,
    /// including images which fail.
    pub fn with_report_handler(
        mut self,
        handler: impl Fn(ImageReport) + Send + Sync + 'static,
    ) -> Self {
        self.on_report = Some(Box::new(handler));
        self
    }

    /// Extract the products from a single image.
    ///
    /// Returns an error with [`io::ErrorKind::NotFound`] if the image does not
    /// exist, or an error if the recognizer fails. An image without any
    /// recognizable products is not an error.
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub async fn process_image(&self, path: &Path) -> Result<Vec<ProductRecord>> {
        let (outcome, result) = match self.run_stages(path).await {
            Ok(ImageOutcome::Done(records)) => {
                (ImageOutcome::Done(records.clone()), Ok(records))
            }
            Ok(empty) => (empty, Ok(vec![])),
            Err(err) => (
                ImageOutcome::Empty(EmptyReason::Failed(format!("{err:#}"))),
                Err(err),
            ),
        };
        if let Some(on_report) = &self.on_report {
            on_report(ImageReport {
                path: path.to_owned(),
                outcome,
            });
        }
        result
    }

    /// Extract the products from several images, in order, and concatenate
    /// them. Images which fail are logged and contribute nothing.
    pub async fn process_multiple_images(&self, paths: &[PathBuf]) -> Vec<ProductRecord> {
        let mut records = vec![];
        for path in paths {
            match self.process_image(path).await {
                Ok(found) => records.extend(found),
                Err(err) => warn!("Could not process {}: {err:#}", path.display()),
            }
        }
        records
    }

    /// Drive one image through our stages.
    async fn run_stages(&self, path: &Path) -> Result<ImageOutcome> {
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Image not found: {}", path.display()),
            )
            .into());
        }

        let mut stage = ImageStage::Recognizing;
        loop {
            trace!(?stage, "Image stage");
            stage = match stage {
                ImageStage::Recognizing => {
                    let fragments = self
                        .recognizer
                        .recognize(path)
                        .await
                        .with_context(|| format!("failed to recognize text in {}", path.display()))?;
                    if fragments.is_empty() {
                        info!("No text found in {}", path.display());
                        ImageStage::Empty(EmptyReason::NoText)
                    } else {
                        info!("Extracted {} text fragments", fragments.len());
                        ImageStage::Structuring {
                            raw_text: fragments.join("\n"),
                        }
                    }
                }
                ImageStage::Structuring { raw_text } => {
                    let records = self.agent.extract_products(&raw_text).await;
                    info!("Structured into {} products", records.len());
                    if records.is_empty() {
                        ImageStage::Empty(EmptyReason::NoProducts)
                    } else {
                        ImageStage::Done(records)
                    }
                }
                ImageStage::Done(records) => return Ok(ImageOutcome::Done(records)),
                ImageStage::Empty(reason) => return Ok(ImageOutcome::Empty(reason)),
            };
        }
    }
}
