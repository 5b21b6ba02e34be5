use std::sync::Arc;

use subtitle_extract_frames::{DirectoryFrames, SliceJob, Slicer};
use subtitle_extract_ocr::{NoopOcrEngine, OcrEngine, OcrRequest};
#[cfg(feature = "ocr-tesseract")]
use subtitle_extract_ocr::TesseractCliEngine;
use subtitle_extract_segment::{Segmenter, encode_region};
use subtitle_extract_types::format_clock;

use crate::check::{MaskPalette, render_mask, save_image};
use crate::cli::{CheckArgs, CliArgs, Command, ConvArgs, NewArgs, OcrArgs, OcrBackend, SliceArgs};
use crate::error::AppError;
use crate::progress;
use crate::settings::{Config, load_config, save_config};
use crate::stage::OcrPipeline;
use crate::subtitle::{merge_similar, read_raw, render, render_raw, write_file};

pub async fn run(cli: CliArgs) -> Result<(), AppError> {
    match cli.command {
        Command::New(args) => new(args),
        Command::Slice(args) => slice(args).await,
        Command::Check(args) => check(args).await,
        Command::Ocr(args) => ocr(args).await,
        Command::Conv(args) => conv(args).await,
    }
}

fn new(args: NewArgs) -> Result<(), AppError> {
    let path = save_config(&args.config.path, &Config::default())?;
    log::info!("default configuration written to {}", path.display());
    Ok(())
}

async fn slice(args: SliceArgs) -> Result<(), AppError> {
    let config = load_config(&args.config.path)?;
    let layout = config.frame_layout(&args.dir)?;
    let slicer = Slicer::new(layout, config.frame_clock()?).with_program(&args.ffmpeg);
    let job = SliceJob {
        input: args.input,
        begin: args.range.begin,
        end: args.range.end,
        filters: config.ffmpeg.filters.clone(),
        append_args: config.ffmpeg.append_args.clone(),
    };

    let bar = progress::spinner("slice", !args.no_progress);
    let result = slicer
        .run(&job, |reached| bar.set_message(format_clock(reached)))
        .await;
    bar.finish_and_clear();

    let summary = result?;
    match summary.stopped_at {
        Some(key) => log::info!("renamed {} frames, stopped at {key}", summary.renamed),
        None => log::info!("renamed {} frames", summary.renamed),
    }
    Ok(())
}

async fn check(args: CheckArgs) -> Result<(), AppError> {
    let config = load_config(&args.config.path)?;
    let format = config.region_format()?;
    let segmenter = Segmenter::new(config.segmenter_config()?);
    let image = image::open(&args.input)
        .map_err(|source| AppError::Image {
            path: args.input.clone(),
            source,
        })?
        .to_rgb8();
    let segmentation = segmenter.segment(&image);

    if let Some(output) = &args.output {
        let palette = MaskPalette::from(&config.check);
        let rendered = render_mask(&image, &segmentation, &palette);
        save_image(output, &rendered, format).map_err(|source| AppError::Image {
            path: output.clone(),
            source,
        })?;
        log::info!("debugging image written to {}", output.display());
    }

    let Some(region) = segmentation.region else {
        log::info!("no text detected");
        return Ok(());
    };
    let bytes = match encode_region(&region, format) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("failed to encode region: {err}");
            Vec::new()
        }
    };
    let replacer = config.ocr_replacer()?;
    let engine = build_engine(args.ocr_backend, &config)?;
    let text = tokio::task::spawn_blocking(move || {
        engine.warm_up()?;
        engine.recognize(&OcrRequest::new(&bytes))
    })
    .await
    .map_err(|err| AppError::Unsupported(format!("recognition task failed: {err}")))??;
    println!("{}", replacer.apply(&text.text));
    Ok(())
}

async fn ocr(args: OcrArgs) -> Result<(), AppError> {
    let config = load_config(&args.config.path)?;
    let clock = config.frame_clock()?;
    let frames = Arc::new(DirectoryFrames::new(config.frame_layout(&args.dir)?));
    let engine = build_engine(args.ocr_backend, &config)?;
    engine.warm_up()?;
    log::info!(
        "running {} OCR over {} with {} workers",
        engine.name(),
        args.dir.display(),
        args.concurrency
    );

    let pipeline = OcrPipeline::new(
        Segmenter::new(config.segmenter_config()?),
        frames,
        engine,
        clock,
    )
    .with_replacer(config.ocr_replacer()?)
    .with_cache(config.ocr.cache)
    .with_region_format(config.region_format()?)
    .with_concurrency(args.concurrency as usize);

    let bar = progress::spinner("ocr", !args.no_progress);
    let result = pipeline
        .run_with_progress(args.range.begin, args.range.end, |record| {
            bar.inc(1);
            bar.set_message(record.key.to_string());
        })
        .await;
    let frames_seen = bar.position();
    bar.finish_and_clear();

    let segments = result?;
    write_file(&args.output, &render_raw(&segments)).await?;
    log::info!(
        "{} segments from {frames_seen} frames written to {}",
        segments.len(),
        args.output.display()
    );
    Ok(())
}

async fn conv(args: ConvArgs) -> Result<(), AppError> {
    let config = load_config(&args.config.path)?;
    let format = config.subtitle_format()?;
    let clock = config.frame_clock()?;
    let replacer = config.convert_replacer()?;

    let segments = read_raw(&args.input).await?;
    let read = segments.len();
    let merged = merge_similar(segments, &replacer, &config.convert.merge);
    write_file(&args.output, &render(format, &merged, &clock)).await?;
    log::info!(
        "converted {read} entries into {} {format} cues",
        merged.len()
    );
    Ok(())
}

fn build_engine(backend: OcrBackend, config: &Config) -> Result<Box<dyn OcrEngine>, AppError> {
    match backend {
        OcrBackend::Noop => Ok(Box::new(NoopOcrEngine)),
        #[cfg(feature = "ocr-tesseract")]
        OcrBackend::Tesseract => Ok(Box::new(TesseractCliEngine::new(
            config.tesseract_options(),
        ))),
        #[cfg(not(feature = "ocr-tesseract"))]
        OcrBackend::Tesseract => {
            let _ = config;
            Err(AppError::Unsupported(
                "tesseract support is not compiled into this build".into(),
            ))
        }
    }
}
