use std::path::{Path, PathBuf};

use clap::{value_parser, ArgAction::*};
use vid_slide_lib::*;

use crate::app::*;

// input specification
const VIDEO: &str = "Video file";
const URL: &str = "Video URL";
const IMAGES: &str = "Image directory";
const DOWNLOAD_DIR: &str = "Download directory";
const MAX_FRAMES: &str = "Max frames";
const TIMEOUT: &str = "Timeout";

// filtering
const THRESHOLD: &str = "Retention threshold";
const NO_FILTER: &str = "No filter";

// frame output
const FRAMES_DIR: &str = "Frames directory";
const FRAME_FORMAT: &str = "Frame format";
const JPEG_QUALITY: &str = "Frame JPEG quality";

// document output
const PDF: &str = "PDF path";
const PAGE_SIZE: &str = "Page size";
const ORIENTATION: &str = "Orientation";
const PDF_QUALITY: &str = "PDF JPEG quality";

// report
const OUTPUT_FORMAT: &str = "Format";

// Arg specification
const ARGS_FILE: &str = "Args file";

//Verbosity
const VERBOSITY_QUIET: &str = "Quiet";
const VERBOSITY_VERBOSE: &str = "Verbose";

const DISPLAY_ORDERING: [&str; 19] = [
    //
    //inputs
    VIDEO,
    URL,
    IMAGES,
    DOWNLOAD_DIR,
    MAX_FRAMES,
    TIMEOUT,
    //
    //filtering
    THRESHOLD,
    NO_FILTER,
    //
    //outputs
    FRAMES_DIR,
    FRAME_FORMAT,
    JPEG_QUALITY,
    PDF,
    PAGE_SIZE,
    ORIENTATION,
    PDF_QUALITY,
    OUTPUT_FORMAT,
    //
    //verbosity
    VERBOSITY_QUIET,
    VERBOSITY_VERBOSE,
    //argument replacement
    ARGS_FILE,
];

fn parse_threshold(arg: &str) -> Result<RetentionThreshold, String> {
    let value = arg.parse::<f64>().map_err(|e| e.to_string())?;
    RetentionThreshold::new(value).map_err(|e| e.to_string())
}

fn build_app() -> clap::Command {
    let get_ordering = |arg_name: &str| -> usize {
        match DISPLAY_ORDERING.iter().position(|x| *x == arg_name) {
            Some(idx) => idx,
            None => {
                panic!("argument not assigned a display order: {arg_name:?}");
            }
        }
    };

    let default_threshold_string = DEFAULT_RETENTION_THRESHOLD.to_string();

    //args are not added through method chaining because rustfmt struggles with very long expressions.
    let mut clap_app = clap::Command::new("Video slide extractor")
        .version(clap::crate_version!())
        .about("Turn a slideshow-style video into a sequence of distinct frames and a PDF");

    clap_app = clap_app.arg(
        clap::Arg::new(VIDEO)
            .long("video")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .required_unless_present_any([URL, IMAGES, ARGS_FILE])
            .conflicts_with_all([URL, IMAGES])
            .help("A local video file to extract slides from. Needs ffmpeg and ffprobe")
            .display_order(get_ordering(VIDEO)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(URL)
            .long("url")
            .num_args(1)
            .value_parser(value_parser!(String))
            .conflicts_with_all([VIDEO, IMAGES])
            .help("A remote video to download with yt-dlp and then extract slides from")
            .display_order(get_ordering(URL)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(IMAGES)
            .long("images")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .conflicts_with_all([VIDEO, URL])
            .help("A directory of png/jpg/bmp images, processed in lexicographic filename order (img10.png comes before img2.png)")
            .display_order(get_ordering(IMAGES)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(DOWNLOAD_DIR)
            .long("download-dir")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .requires(URL)
            .help("Where --url videos are downloaded to. Defaults to the system temporary directory")
            .display_order(get_ordering(DOWNLOAD_DIR)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MAX_FRAMES)
            .long("max-frames")
            .num_args(1)
            .value_parser(value_parser!(u64).range(1..))
            .help("Stop after reading this many frames from the input")
            .display_order(get_ordering(MAX_FRAMES)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(TIMEOUT)
            .long("timeout")
            .num_args(1)
            .value_parser(value_parser!(u64).range(1..))
            .help("Give up on downloading or decoding a video after this many seconds")
            .display_order(get_ordering(TIMEOUT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(THRESHOLD)
            .long("threshold")
            .num_args(1)
            .value_parser(parse_threshold)
            .default_value(default_threshold_string)
            .conflicts_with(NO_FILTER)
            .help("Keep a frame when more than this fraction of its pixels differ from the last kept frame. Must be in (0, 1]. Values between 0.2 and 0.4 work well for most slideshows")
            .display_order(get_ordering(THRESHOLD)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(NO_FILTER)
            .long("no-filter")
            .num_args(0)
            .action(SetTrue)
            .help("Keep every frame. With --video this extracts all frames; with --images and --pdf it packs every image into the PDF")
            .display_order(get_ordering(NO_FILTER)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FRAMES_DIR)
            .long("frames-dir")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("Write kept frames to this directory as img00001.png, img00002.png, ...")
            .display_order(get_ordering(FRAMES_DIR)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FRAME_FORMAT)
            .long("frame-format")
            .num_args(1)
            .value_parser(value_parser!(FrameFormatArg))
            .default_value("png")
            .requires(FRAMES_DIR)
            .display_order(get_ordering(FRAME_FORMAT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(JPEG_QUALITY)
            .long("jpeg-quality")
            .num_args(1)
            .value_parser(value_parser!(u8).range(1..=100))
            .requires(FRAMES_DIR)
            .help("JPEG quality (1-100) of frames written with --frame-format jpg. Rejected for png frames")
            .display_order(get_ordering(JPEG_QUALITY)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(PDF)
            .long("pdf")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("Write kept frames to this PDF, one frame per page, scaled to fit and centred")
            .display_order(get_ordering(PDF)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(PAGE_SIZE)
            .long("page-size")
            .num_args(1)
            .value_parser(value_parser!(PageSizeArg))
            .default_value("a4")
            .display_order(get_ordering(PAGE_SIZE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ORIENTATION)
            .long("orientation")
            .num_args(1)
            .value_parser(value_parser!(OrientationArg))
            .default_value("landscape")
            .display_order(get_ordering(ORIENTATION)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(PDF_QUALITY)
            .long("pdf-quality")
            .num_args(1)
            .value_parser(value_parser!(u8).range(1..=100))
            .requires(PDF)
            .help("JPEG quality (1-100) of the images embedded in the PDF")
            .display_order(get_ordering(PDF_QUALITY)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(OUTPUT_FORMAT)
            .long("output-format")
            .num_args(1)
            .value_parser(value_parser!(OutputFormat))
            .default_value("normal")
            .help("How the summary of the run is printed to stdout")
            .display_order(get_ordering(OUTPUT_FORMAT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ARGS_FILE)
            .long("args-file")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("Read command line arguments from a file. Lines starting with # are ignored. If this argument is used it must be the only argument")
            .display_order(get_ordering(ARGS_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_QUIET)
            .long("quiet")
            .help("Reduced verbosity")
            .conflicts_with(VERBOSITY_VERBOSE)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_QUIET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_VERBOSE)
            .long("verbose")
            .help("Increased verbosity")
            .conflicts_with(VERBOSITY_QUIET)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_VERBOSE)),
    );

    clap_app
}

pub fn parse_args() -> AppCfg {
    //capture the cwd once, to minimize the risk of working with two values if it is changed by the OS at runtime.
    let cwd = std::env::current_dir()
        .map_err(|e| eyre::Report::new(e).wrap_err("Failed to read the current directory"))
        .unwrap_or_else(|e| print_error_and_quit(e));

    //Start by parsing the provided arguments from the commandline. If the --args-file
    //argument is provided, then we will ignore the true command line arguments and
    //take the arguments from the file instead.
    let args = get_args_from_cmdline_or_file();

    cfg_from_matches(&args, &cwd).unwrap_or_else(|e| print_error_and_quit(e))
}

fn cfg_from_matches(args: &clap::ArgMatches, cwd: &Path) -> eyre::Result<AppCfg> {
    let abs = |name: &str| args.get_one::<PathBuf>(name).map(|p| absolutify_path(cwd, p));

    let input = if let Some(video) = abs(VIDEO) {
        Input::Video(video)
    } else if let Some(url) = args.get_one::<String>(URL) {
        Input::Url(url.clone())
    } else if let Some(images) = abs(IMAGES) {
        Input::ImageDir(images)
    } else {
        return Err(eyre::Report::msg("one of --video, --url or --images is required"));
    };

    let filter = if args.get_flag(NO_FILTER) {
        None
    } else {
        Some(
            args.get_one::<RetentionThreshold>(THRESHOLD)
                .copied()
                .unwrap_or_default(),
        )
    };

    let frame_format = match (args.get_one::<FrameFormatArg>(FRAME_FORMAT), args.get_one::<u8>(JPEG_QUALITY)) {
        (None | Some(FrameFormatArg::Png), None) => FrameFormat::Png,
        (None | Some(FrameFormatArg::Png), Some(_)) => {
            return Err(eyre::Report::msg("--jpeg-quality only applies to --frame-format jpg"));
        }
        (Some(FrameFormatArg::Jpg), Some(quality)) => FrameFormat::jpeg(*quality)?,
        (Some(FrameFormatArg::Jpg), None) => FrameFormat::jpeg_default(),
    };

    let document = abs(PDF).map(|path| {
        let size = args.get_one::<PageSizeArg>(PAGE_SIZE).copied().unwrap_or(PageSizeArg::A4);
        let orientation = args
            .get_one::<OrientationArg>(ORIENTATION)
            .copied()
            .unwrap_or(OrientationArg::Landscape);

        let mut document = DocumentCfg::new(path);
        document.page = PageDimensions::paper(size.into(), orientation.into());
        if let Some(quality) = args.get_one::<u8>(PDF_QUALITY) {
            document.jpeg_quality = *quality;
        }
        document
    });

    let frames_dir = abs(FRAMES_DIR);
    let timeout_secs = args.get_one::<u64>(TIMEOUT).copied();

    let verbosity = if args.get_flag(VERBOSITY_QUIET) {
        ReportVerbosity::Quiet
    } else if args.get_flag(VERBOSITY_VERBOSE) {
        ReportVerbosity::Verbose
    } else {
        ReportVerbosity::Default
    };

    let output_cfg = OutputCfg {
        format: args
            .get_one::<OutputFormat>(OUTPUT_FORMAT)
            .copied()
            .unwrap_or(OutputFormat::Normal),
        verbosity,
    };

    //An unfiltered directory of images with only a pdf as output needs no frame processing at all,
    //so just pack the files into the document as they are.
    let mode = match (input, filter, frames_dir, document) {
        (Input::ImageDir(images_dir), None, None, Some(document)) => RunMode::AssembleOnly { images_dir, document },
        (input, filter, frames_dir, document) => {
            let mut cfg = PipelineCfg::new(input);
            cfg.filter = filter;
            cfg.frames_dir = frames_dir;
            cfg.frame_format = frame_format;
            cfg.document = document;
            cfg.source.max_frames = args.get_one::<u64>(MAX_FRAMES).copied();
            cfg.source.timeout_secs = timeout_secs;
            if let Some(download_dir) = abs(DOWNLOAD_DIR) {
                cfg.download_dir = download_dir;
            }
            RunMode::Pipeline(cfg)
        }
    };

    Ok(AppCfg {
        mode,
        output_cfg,
        timeout_secs,
    })
}

// Arguments are always first read from the command line, but if --args-file
// is present, then arguments are actually located in a file on disk.
// This fn obtains the args from the correct location.
fn get_args_from_cmdline_or_file() -> clap::ArgMatches {
    let cmdline_args = build_app().get_matches();

    match cmdline_args.get_one::<PathBuf>(ARGS_FILE) {
        None => cmdline_args,
        Some(args_path) => get_argsfile_args(args_path),
    }
}

fn get_argsfile_args(argsfile_path: &Path) -> clap::ArgMatches {
    let args = std::fs::read_to_string(argsfile_path)
        .map_err(eyre::Report::msg)
        .and_then(|text| split_args_file(&text))
        .map_err(|e| {
            e.wrap_err(format!(
                "Failed to parse args file at location {}",
                argsfile_path.to_string_lossy()
            ))
        })
        .unwrap_or_else(|e| print_error_and_quit(e));

    //When parsing args from file, the binary name will not be present,
    // so update the parser that we use to not expect it.
    let matches = build_app().no_binary_name(true).get_matches_from(args);
    matches
}

// Split the contents of an args file the way a shell would, dropping comment lines.
fn split_args_file(text: &str) -> eyre::Result<Vec<String>> {
    let contents = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    shell_words::split(&contents).map_err(eyre::Report::msg)
}

fn absolutify_path(cwd: &Path, path: &Path) -> PathBuf {
    //get the absolute path if it is not absolute, by prepending the cwd.
    let path = if path.is_relative() {
        cwd.join(path)
    } else {
        path.to_path_buf()
    };

    //outputs usually do not exist yet, so fall back to the joined path.
    let p = path.canonicalize().unwrap_or(path);

    p
}
