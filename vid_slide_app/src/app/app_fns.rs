use std::{
    error::Error,
    io::{BufWriter, Write},
    path::Path,
    time::Duration,
};

use serde_json::json;
use vid_slide_lib::*;

use crate::app::*;

pub fn run_app() -> i32 {
    let cfg = arg_parse::parse_args();
    configure_logs(cfg.output_cfg.verbosity);

    match run_app_inner(&cfg) {
        Ok(()) => 0,
        Err(fatal_error) => {
            print_fatal_err(fatal_error, cfg.output_cfg.verbosity);
            1
        }
    }
}

fn run_app_inner(cfg: &AppCfg) -> eyre::Result<()> {
    if cfg.needs_ffmpeg() && !ffmpeg_cmdline_utils::ffmpeg_and_ffprobe_are_callable() {
        return Err(AppError::FfmpegNotCallable.into());
    }

    match &cfg.mode {
        RunMode::Pipeline(pipeline_cfg) => {
            if pipeline_cfg.frames_dir.is_none() && pipeline_cfg.document.is_none() {
                warn!("Neither --frames-dir nor --pdf was given. Frames will be counted but not saved");
            }

            let mut fetcher = YtDlpFetcher::default();
            if let Some(secs) = cfg.timeout_secs {
                fetcher = fetcher.with_timeout(Duration::from_secs(secs));
            }

            let report = run_pipeline(pipeline_cfg, &fetcher).map_err(AppError::from)?;
            print_run_report(&report, cfg.output_cfg.format)?;
        }

        RunMode::AssembleOnly { images_dir, document } => {
            let report = assemble_document(images_dir, document).map_err(AppError::from)?;
            print_assemble_report(&report, images_dir, &document.path, cfg.output_cfg.format)?;
        }
    }

    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_run_report(report: &RunReport, format: OutputFormat) -> eyre::Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Normal => {
            println!("frames read:    {}", report.frames_read);
            println!("frames kept:    {}", report.frames_kept);

            if let Some(dir) = &report.frames_dir {
                println!("frames written: {} (to {})", report.frames_written, dir.display());
            }
            if let Some(path) = &report.document_path {
                println!("pages:          {} (in {})", report.pages, path.display());
            }

            let failures = [
                ("undecodable inputs", report.decode_failures),
                ("frames that could not be compared", report.comparison_failures),
                ("frames that could not be written", report.encode_failures),
                ("frames that could not be placed on a page", report.page_failures),
            ];
            for (what, count) in failures.into_iter().filter(|(_, count)| *count > 0) {
                println!("{what}: {count}");
            }
        }
    }

    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_assemble_report(
    report: &ComposeReport,
    images_dir: &Path,
    pdf_path: &Path,
    format: OutputFormat,
) -> eyre::Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "images_dir": images_dir,
            "document_path": pdf_path,
            "pages": report.pages_added,
            "pages_skipped": report.pages_skipped,
        }))?,
        OutputFormat::Normal => {
            println!("pages: {} (in {})", report.pages_added, pdf_path.display());
            if report.pages_skipped > 0 {
                println!("images that could not be placed on a page: {}", report.pages_skipped);
            }
        }
    }

    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> eyre::Result<()> {
    let mut out = BufWriter::new(std::io::stdout().lock());
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn print_fatal_err(fatal_err: eyre::Report, verbosity: ReportVerbosity) {
    error!(target: "app-errorlog", "{}", fatal_err);

    if verbosity == ReportVerbosity::Verbose {
        let mut source: Option<&(dyn Error + 'static)> = fatal_err.source();
        while let Some(e) = source {
            error!(target: "app-errorlog", "    caused by: {}", e);
            source = e.source();
        }
    }
}

#[allow(clippy::print_stderr)]
pub fn configure_logs(verbosity: ReportVerbosity) {
    use simplelog::*;

    let mut cfg = simplelog::ConfigBuilder::new();
    cfg.set_thread_level(LevelFilter::Off);

    let min_loglevel = match verbosity {
        ReportVerbosity::Quiet => LevelFilter::Warn,
        ReportVerbosity::Default => LevelFilter::Info,
        ReportVerbosity::Verbose => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(min_loglevel, cfg.build(), TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("failed to initialize logging: {e}");
    }
}
