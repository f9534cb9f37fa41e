use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{Rgb, RgbImage};
use itertools::Itertools;
use rand::prelude::*;
use tempfile::TempDir;
use vid_slide_lib::*;

struct PanicFetcher;

impl RemoteFetcher for PanicFetcher {
    fn fetch(&self, url: &str, _dest_dir: &Path) -> Result<PathBuf, FetchError> {
        panic!("no download expected, asked for {url}")
    }
}

fn solid(shade: u8) -> RgbImage {
    RgbImage::from_pixel(32, 24, Rgb([shade, shade, shade]))
}

/// Writes `images` as numbered PNGs and returns the directory.
fn image_dir(images: &[RgbImage]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (i, image) in images.iter().enumerate() {
        image.save(dir.path().join(format!("frame_{i:03}.png"))).unwrap();
    }
    dir
}

fn file_names(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .sorted()
        .collect()
}

fn pdf_page_count(path: &Path) -> usize {
    lopdf::Document::load(path).unwrap().get_pages().len()
}

#[test]
fn test_directory_listing_is_lexicographic_not_numeric() {
    let dir = TempDir::new().unwrap();
    for name in ["img2.png", "img1.png", "img10.png"] {
        solid(0).save(dir.path().join(name)).unwrap();
    }

    let names = list_still_images(dir.path())
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect::<Vec<_>>();

    assert_eq!(names, vec!["img1.png", "img10.png", "img2.png"]);
}

#[test]
fn test_filter_directory_to_frames_and_pdf() {
    // three slides, each shown several times
    let images = [solid(0), solid(0), solid(0), solid(128), solid(128), solid(255), solid(255)];
    let input = image_dir(&images);
    let out = TempDir::new().unwrap();
    let frames_dir = out.path().join("frames");
    let pdf_path = out.path().join("slides.pdf");

    let mut cfg = PipelineCfg::new(Input::ImageDir(input.path().to_path_buf()));
    cfg.frames_dir = Some(frames_dir.clone());
    cfg.document = Some(DocumentCfg::new(&pdf_path));

    let report = run_pipeline(&cfg, &PanicFetcher).unwrap();

    assert_eq!(report.frames_read, 7);
    assert_eq!(report.frames_kept, 3);
    assert_eq!(report.frames_written, 3);
    assert_eq!(report.pages, 3);
    assert_eq!(report.document_path.as_deref(), Some(pdf_path.as_path()));
    assert_eq!(report.frames_dir.as_deref(), Some(frames_dir.as_path()));

    assert_eq!(file_names(&frames_dir), vec!["img00001.png", "img00002.png", "img00003.png"]);
    assert_eq!(pdf_page_count(&pdf_path), 3);

    //written frames come back in the order they were kept
    let shades = FrameSequence::open_directory(&frames_dir, SourceOptions::default())
        .unwrap()
        .map(|frame| frame.image().get_pixel(0, 0)[0])
        .collect::<Vec<_>>();
    assert_eq!(shades, vec![0, 128, 255]);
}

#[test]
fn test_no_filter_extracts_every_frame() {
    let images = [solid(10), solid(10), solid(10), solid(10)];
    let input = image_dir(&images);
    let out = TempDir::new().unwrap();

    let mut cfg = PipelineCfg::new(Input::ImageDir(input.path().to_path_buf()));
    cfg.filter = None;
    cfg.frames_dir = Some(out.path().to_path_buf());
    cfg.frame_format = FrameFormat::jpeg(90).unwrap();

    let report = run_pipeline(&cfg, &PanicFetcher).unwrap();

    assert_eq!(report.frames_kept, 4);
    assert_eq!(
        file_names(out.path()),
        vec!["img00001.jpg", "img00002.jpg", "img00003.jpg", "img00004.jpg"]
    );
}

#[test]
fn test_undecodable_inputs_are_counted_not_fatal() {
    let input = image_dir(&[solid(0), solid(255)]);
    fs::write(input.path().join("frame_000a.png"), b"definitely not a png").unwrap();

    let cfg = PipelineCfg::new(Input::ImageDir(input.path().to_path_buf()));
    let report = run_pipeline(&cfg, &PanicFetcher).unwrap();

    assert_eq!(report.frames_read, 2);
    assert_eq!(report.frames_kept, 2);
    assert_eq!(report.decode_failures, 1);
}

#[test]
fn test_max_frames_limits_the_source() {
    let input = image_dir(&[solid(0), solid(100), solid(200), solid(50)]);

    let mut cfg = PipelineCfg::new(Input::ImageDir(input.path().to_path_buf()));
    cfg.source.max_frames = Some(2);
    let report = run_pipeline(&cfg, &PanicFetcher).unwrap();

    assert_eq!(report.frames_read, 2);
}

#[test]
fn test_unwritable_frames_dir_is_fatal() {
    let input = image_dir(&[solid(0)]);
    let out = TempDir::new().unwrap();
    let blocker = out.path().join("file");
    fs::write(&blocker, b"").unwrap();

    let mut cfg = PipelineCfg::new(Input::ImageDir(input.path().to_path_buf()));
    cfg.frames_dir = Some(blocker.join("frames"));

    let result = run_pipeline(&cfg, &PanicFetcher);
    assert!(matches!(result, Err(Error::Source(SourceError::OutputUnavailable { .. }))));
}

#[test]
fn test_assemble_document_from_directory() {
    let input = image_dir(&[solid(0), solid(0), solid(90)]);
    let out = TempDir::new().unwrap();
    let mut doc_cfg = DocumentCfg::new(out.path().join("all.pdf"));
    doc_cfg.page = PageDimensions::paper(PaperSize::Letter, Orientation::Portrait);

    let report = assemble_document(input.path(), &doc_cfg).unwrap();

    //no filtering: duplicates are kept
    assert_eq!(report.pages_added, 3);
    assert_eq!(pdf_page_count(&doc_cfg.path), 3);
}

#[test]
fn test_layout_preserves_aspect_and_centres() {
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..200 {
        let frame = (rng.gen_range(1..4000), rng.gen_range(1..4000));
        let page = PageDimensions::new(rng.gen_range(10.0..2000.0), rng.gen_range(10.0..2000.0));
        let placed = layout(frame, page).unwrap();

        let frame_aspect = f64::from(frame.0) / f64::from(frame.1);
        let drawn_aspect = f64::from(placed.width) / f64::from(placed.height);
        assert!(
            (frame_aspect - drawn_aspect).abs() / frame_aspect < 1e-3,
            "expected aspect {frame_aspect}, actual {drawn_aspect}"
        );

        //centred on both axes, and touching the page edges on at least one
        assert!((placed.x + placed.width / 2.0 - page.width / 2.0).abs() < 1e-2);
        assert!((placed.y + placed.height / 2.0 - page.height / 2.0).abs() < 1e-2);
        assert!(placed.x.abs() < 1e-2 || placed.y.abs() < 1e-2);
    }
}

#[test]
fn test_layout_of_vga_frame_on_wide_page() {
    let placed = layout((640, 480), PageDimensions::new(1000.0, 700.0)).unwrap();

    let scale = placed.height / 480.0;
    assert!((scale - 1.458).abs() < 1e-3, "scale {scale}");
    assert!((placed.width - 933.33).abs() < 1e-2);
    assert!((placed.height - 700.0).abs() < 1e-3);
    assert!((placed.x - (1000.0 - placed.width) / 2.0).abs() < 1e-3);
    assert!(placed.y.abs() < 1e-3);
}
