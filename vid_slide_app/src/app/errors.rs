use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("ffmpeg and ffprobe must be installed and visible on the command line to read videos")]
    FfmpegNotCallable,

    #[error(transparent)]
    Pipeline(#[from] vid_slide_lib::Error),
}

pub fn print_error_and_quit(e: eyre::Report) -> ! {
    #[allow(clippy::print_stderr)]
    let () = eprintln!("{:?}", e);
    std::process::exit(1);
}
