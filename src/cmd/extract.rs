//! The `extract` subcommand.

use std::{fmt, sync::Arc};

use clap::Args;
use tokio::sync::mpsc;

use crate::{
    agent::StructuringAgent,
    config::{LEAFLET_IMAGES, OUTPUT_PATH, ServiceConfig},
    drivers::{LlmOpts, openai::OpenAiDriver},
    pipeline::{EmptyReason, ImageOutcome, ImageReport, Pipeline},
    prelude::*,
    product::write_batch_output,
    prompt::{ExtractionPrompt, default_extraction_prompt},
    recognizers::RecognizerType,
    ui::{ProgressConfig, Ui},
};

/// How many products to preview per image.
const PREVIEW_COUNT: usize = 3;

/// How much of each product name to show in previews.
const PREVIEW_NAME_CHARS: usize = 40;

/// Options for the `extract` subcommand.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// The text recognizer to use.
    #[clap(long, value_enum, default_value_t = RecognizerType::default())]
    pub recognizer: RecognizerType,

    /// Recognizer language, in tesseract's format (`eng`, `eng+fra`).
    #[clap(long, default_value = "eng")]
    pub lang: String,

    /// A TOML file to use instead of the built-in extraction prompt.
    #[clap(long)]
    pub prompt: Option<PathBuf>,

    #[clap(flatten)]
    pub llm_opts: LlmOpts,
}

/// Run the `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    let images = LEAFLET_IMAGES.iter().map(PathBuf::from).collect::<Vec<_>>();
    check_images_exist(&images)?;
    for (idx, image) in images.iter().enumerate() {
        info!("Leaflet {}: {}", idx + 1, image.display());
    }

    // Build everything before we start, so configuration problems show up
    // before any slow work.
    let config = ServiceConfig::from_env()?;
    let prompt = match &opts.prompt {
        Some(path) => ExtractionPrompt::from_path(path).await?,
        None => default_extraction_prompt(),
    };
    let driver = Arc::new(OpenAiDriver::new(&config));
    let recognizer = opts.recognizer.create_recognizer(&opts.lang).await?;
    let agent = StructuringAgent::new(driver, prompt, opts.llm_opts.clone());

    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "📷",
            msg: "Processing leaflets",
            done_msg: "Processed leaflets",
        },
        images.len() as u64,
    );
    let (report_tx, mut report_rx) = mpsc::unbounded_channel::<ImageReport>();
    let image_pb = pb.clone();
    let pipeline = Pipeline::new(recognizer, agent).with_report_handler(move |report| {
        let image = report.path.display();
        match report.records().len() {
            0 => warn!("No products extracted from {image}"),
            count => info!("Added {count} products from {image}"),
        }
        image_pb.inc(1);
        // The receiver outlives the pipeline.
        let _ = report_tx.send(report);
    });
    let records = pipeline.process_multiple_images(&images).await;
    pb.finish_using_style();

    let mut reports = Vec::with_capacity(images.len());
    while let Ok(report) = report_rx.try_recv() {
        reports.push(report);
    }
    let summary = BatchSummary::new(reports);
    if records.is_empty() {
        return Err(anyhow!(
            "No products extracted from any image; nothing written to {OUTPUT_PATH}. \
             Check the images, the recognizer and your API key, then rerun \
             `leaflet-extractor extract`."
        ));
    }

    let output_path = Path::new(OUTPUT_PATH);
    write_batch_output(output_path, &records).await?;
    let shown_path = std::path::absolute(output_path).unwrap_or_else(|_| output_path.to_owned());
    print!("{}", summary.display(&shown_path));
    Ok(())
}

/// Fail unless every image exists, naming all the missing ones.
pub fn check_images_exist(images: &[PathBuf]) -> Result<()> {
    let missing = images
        .iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "Image file(s) not found: {}. Put both leaflet images in the working \
             directory and rerun `leaflet-extractor extract`.",
            missing.join(", ")
        ))
    }
}

/// The per-image results of a batch run.
pub struct BatchSummary {
    reports: Vec<ImageReport>,
}

impl BatchSummary {
    /// Summarize a batch.
    pub fn new(reports: Vec<ImageReport>) -> Self {
        Self { reports }
    }

    /// How many records did we extract in total?
    pub fn total(&self) -> usize {
        self.reports.iter().map(|r| r.records().len()).sum()
    }

    /// Format our summary for the operator.
    pub fn display<'a>(&'a self, output_path: &'a Path) -> BatchSummaryDisplay<'a> {
        BatchSummaryDisplay {
            summary: self,
            output_path,
        }
    }
}

/// Helper for displaying a [`BatchSummary`].
pub struct BatchSummaryDisplay<'a> {
    summary: &'a BatchSummary,
    output_path: &'a Path,
}

impl fmt::Display for BatchSummaryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reports = &self.summary.reports;
        writeln!(f, "Total products extracted: {}", self.summary.total())?;
        writeln!(f, "Output file: {}", self.output_path.display())?;

        writeln!(f)?;
        writeln!(f, "Breakdown by image:")?;
        for report in reports {
            let name = report.path.display();
            match &report.outcome {
                ImageOutcome::Done(records) => {
                    writeln!(f, "  • {name}: {} products", records.len())?
                }
                ImageOutcome::Empty(EmptyReason::NoText) => {
                    writeln!(f, "  • {name}: 0 products (no text recognized)")?
                }
                ImageOutcome::Empty(EmptyReason::NoProducts) => {
                    writeln!(f, "  • {name}: 0 products (none found in the text)")?
                }
                ImageOutcome::Empty(EmptyReason::Failed(err)) => {
                    writeln!(f, "  • {name}: 0 products (failed: {err})")?
                }
            }
        }

        for report in reports.iter().filter(|r| !r.records().is_empty()) {
            writeln!(f)?;
            writeln!(f, "Sample from {}:", report.path.display())?;
            for (idx, record) in report.records().iter().take(PREVIEW_COUNT).enumerate() {
                writeln!(
                    f,
                    "  {}. {} - {}",
                    idx + 1,
                    preview_name(record.name_or_unknown()),
                    record.price_or_na()
                )?;
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Review the results with: leaflet-extractor dashboard"
        )
    }
}

/// Shorten a product name for previews.
fn preview_name(name: &str) -> String {
    if name.chars().count() > PREVIEW_NAME_CHARS {
        let short = name.chars().take(PREVIEW_NAME_CHARS).collect::<String>();
        format!("{short}...")
    } else {
        name.to_owned()
    }
}
