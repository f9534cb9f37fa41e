use image::Rgb;

use crate::definitions::{LUMA_WEIGHTS, LUMA_WEIGHT_SCALE, PIXEL_CHANGE_TOLERANCE};
use crate::{FilterError, Frame};

/// Score given to frames that cannot be compared pixel by pixel because their
/// dimensions differ.
pub const MAX_DISSIMILARITY: f64 = 1.0;

/// The fraction of pixels that differ between two frames, in `[0, 1]`.
///
/// Each pixel's per-channel absolute differences are combined into one luma-weighted
/// value (see [`combined_difference`]). A pixel counts as changed if that value exceeds
/// [`PIXEL_CHANGE_TOLERANCE`]. Frames with different dimensions score
/// [`MAX_DISSIMILARITY`].
///
/// The score is symmetric and a frame always scores 0 against itself.
///
/// # Errors
/// [`FilterError::Malformed`] if either frame has no pixels or a pixel buffer shorter
/// than its dimensions require. `b` is checked first, so when both are malformed the
/// error names the frame being judged rather than the reference.
pub fn dissimilarity(a: &Frame, b: &Frame) -> Result<f64, FilterError> {
    if a.dimensions() != b.dimensions() {
        return Ok(MAX_DISSIMILARITY);
    }

    check_well_formed(b)?;
    check_well_formed(a)?;

    let changed = a
        .image()
        .pixels()
        .zip(b.image().pixels())
        .filter(|(pix_a, pix_b)| combined_difference(pix_a, pix_b) > PIXEL_CHANGE_TOLERANCE)
        .count();

    Ok(changed as f64 / a.pixel_count() as f64)
}

/// Combine the absolute channel differences of two pixels into one value, weighting the
/// channels like an RGB to grayscale conversion (rounded to nearest).
///
/// Monotonic in each channel difference; zero only when the (rounded) weighted sum is zero.
pub fn combined_difference(&Rgb([r1, g1, b1]): &Rgb<u8>, &Rgb([r2, g2, b2]): &Rgb<u8>) -> u8 {
    let [wr, wg, wb] = LUMA_WEIGHTS;
    let weighted = wr * u32::from(r1.abs_diff(r2))
        + wg * u32::from(g1.abs_diff(g2))
        + wb * u32::from(b1.abs_diff(b2));

    //weights sum to the scale, so the rounded quotient never exceeds 255
    let rounded = (weighted + LUMA_WEIGHT_SCALE / 2) / LUMA_WEIGHT_SCALE;
    u8::try_from(rounded).unwrap_or(u8::MAX)
}

fn check_well_formed(frame: &Frame) -> Result<(), FilterError> {
    let required_len = usize::try_from(frame.pixel_count())
        .ok()
        .and_then(|pixels| pixels.checked_mul(3));

    let well_formed = frame.pixel_count() > 0
        && required_len.is_some_and(|required_len| frame.as_raw().len() >= required_len);

    if well_formed {
        Ok(())
    } else {
        Err(FilterError::Malformed {
            index: frame.index(),
            width: frame.width(),
            height: frame.height(),
            len: frame.as_raw().len(),
        })
    }
}

#[cfg(test)]
mod test {
    use image::RgbImage;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn random_frame(rng: &mut StdRng, index: u64, width: u32, height: u32) -> Frame {
        let buf = (0..width * height * 3).map(|_| rng.gen::<u8>()).collect();
        Frame::from_raw(index, width, height, buf).unwrap()
    }

    #[test]
    fn test_identical_frames_score_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            let frame = random_frame(&mut rng, 0, 32, 24);
            let score = dissimilarity(&frame, &frame.clone()).unwrap();
            assert!(score == 0.0, "expected 0.0, actual {score}");
        }
    }

    #[test]
    fn test_symmetric() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..10 {
            let a = random_frame(&mut rng, 0, 16, 16);
            let b = random_frame(&mut rng, 1, 16, 16);
            assert_eq!(dissimilarity(&a, &b).unwrap(), dissimilarity(&b, &a).unwrap());
        }
    }

    #[test]
    fn test_size_mismatch_is_max() {
        let a = Frame::new(0, RgbImage::new(10, 10));
        let b = Frame::new(1, RgbImage::new(10, 11));
        assert_eq!(dissimilarity(&a, &b).unwrap(), MAX_DISSIMILARITY);

        //even if one of them is empty
        let empty = Frame::new(2, RgbImage::new(0, 0));
        assert_eq!(dissimilarity(&a, &empty).unwrap(), MAX_DISSIMILARITY);
    }

    #[test]
    fn test_empty_frames_are_malformed_and_name_the_candidate() {
        let a = Frame::new(3, RgbImage::new(0, 5));
        let b = Frame::new(4, RgbImage::new(0, 5));
        let err = dissimilarity(&a, &b).unwrap_err();
        assert_eq!(
            err,
            FilterError::Malformed {
                index: 4,
                width: 0,
                height: 5,
                len: 0
            }
        );
    }

    #[test]
    fn test_counts_changed_pixels() {
        let a = Frame::new(0, RgbImage::from_pixel(10, 10, Rgb([50, 50, 50])));
        let mut image = a.image().clone();
        for x in 0..10 {
            for y in 0..3 {
                image.put_pixel(x, y, Rgb([200, 10, 90]));
            }
        }
        let b = Frame::new(1, image);

        let score = dissimilarity(&a, &b).unwrap();
        assert!((score - 0.3).abs() < 1e-12, "expected 0.3, actual {score}");
    }

    #[test]
    fn test_combined_difference() {
        let black = Rgb([0, 0, 0]);
        assert_eq!(combined_difference(&black, &black), 0);
        assert_eq!(combined_difference(&black, &Rgb([255, 255, 255])), 255);

        //weighted like a grayscale conversion
        assert_eq!(combined_difference(&black, &Rgb([100, 0, 0])), 30);
        assert_eq!(combined_difference(&black, &Rgb([0, 100, 0])), 59);
        assert_eq!(combined_difference(&black, &Rgb([0, 0, 100])), 11);

        //a tiny blue-only difference rounds away
        assert_eq!(combined_difference(&black, &Rgb([0, 0, 4])), 0);
        assert_eq!(combined_difference(&black, &Rgb([0, 0, 5])), 1);

        //monotonic in each channel
        let mut prev = 0;
        for g in 0..=255u8 {
            let diff = combined_difference(&black, &Rgb([0, g, 0]));
            assert!(diff >= prev, "not monotonic at g={g}");
            prev = diff;
        }
    }
}
