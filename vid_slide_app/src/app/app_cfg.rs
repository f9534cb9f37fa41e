use std::path::PathBuf;

use vid_slide_lib::{DocumentCfg, Orientation, PaperSize, PipelineCfg};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportVerbosity {
    Quiet,
    Default,
    Verbose,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    Normal,
    Json,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PaperSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::A4 => PaperSize::A4,
            PageSizeArg::Letter => PaperSize::Letter,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum OrientationArg {
    Landscape,
    Portrait,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Landscape => Orientation::Landscape,
            OrientationArg::Portrait => Orientation::Portrait,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum FrameFormatArg {
    Png,
    Jpg,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputCfg {
    pub format: OutputFormat,
    pub verbosity: ReportVerbosity,
}

// What the app was asked to do.
#[derive(Debug, Clone)]
pub enum RunMode {
    // decode (or download), filter, and write frames and/or a pdf
    Pipeline(PipelineCfg),

    // pack every image of a directory into a pdf, unfiltered
    AssembleOnly { images_dir: PathBuf, document: DocumentCfg },
}

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub mode: RunMode,
    pub output_cfg: OutputCfg,

    // applies to both the download and decoding
    pub timeout_secs: Option<u64>,
}

impl AppCfg {
    pub fn needs_ffmpeg(&self) -> bool {
        match &self.mode {
            RunMode::Pipeline(cfg) => !matches!(cfg.input, vid_slide_lib::Input::ImageDir(_)),
            RunMode::AssembleOnly { .. } => false,
        }
    }
}
