use image::{GrayImage, imageops};
use rerun::RecordingStream;
use std::io::Cursor;

use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::types::Match;

pub fn log_image_as_compressed(
    recording: &RecordingStream,
    topic: &str,
    img: &GrayImage,
    format: image::ImageFormat,
) -> Result<()> {
    let mut bytes: Vec<u8> = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(std::io::Error::other)?;
    recording.log(
        format!("{}/image", topic),
        &rerun::EncodedImage::from_file_contents(bytes),
    )?;
    Ok(())
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

/// Previous frame on the left, current frame on the right.
pub fn side_by_side(previous: &GrayImage, current: &GrayImage) -> GrayImage {
    let width = previous.width() + current.width();
    let height = previous.height().max(current.height());
    let mut canvas = GrayImage::new(width, height);
    imageops::replace(&mut canvas, previous, 0, 0);
    imageops::replace(&mut canvas, current, previous.width() as i64, 0);
    canvas
}

/// Turbo colour per match, from blue for the smallest distance to red for the largest.
pub fn distance_colors(matches: &[Match]) -> Vec<rerun::Color> {
    let (lo, hi) = matches
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), m| (lo.min(m.distance), hi.max(m.distance)));
    let span = hi - lo;
    matches
        .iter()
        .map(|m| {
            let t = if span > 0.0 {
                ((m.distance - lo) / span) as f64
            } else {
                0.0
            };
            let c = colorous::TURBO.eval_continuous(t);
            rerun::Color::from_rgb(c.r, c.g, c.b)
        })
        .collect()
}

/// Logs the two newest frames of `buffer` with their keypoints and match lines.
///
/// Nothing is logged while the buffer holds fewer than two frames.
pub fn log_frame_pair(recording: &RecordingStream, buffer: &FrameBuffer) -> Result<()> {
    let (Ok(previous), Ok(current)) = (buffer.previous(), buffer.latest()) else {
        return Ok(());
    };
    let offset = previous.image.width() as f32;
    recording.set_time("frame", rerun::TimeCell::from_sequence(current.index as i64));
    log_image_as_compressed(
        recording,
        "matches",
        &side_by_side(&previous.image, &current.image),
        image::ImageFormat::Png,
    )?;

    let pts: Vec<(f32, f32)> = previous
        .keypoints
        .iter()
        .map(|kp| (kp.pt.x, kp.pt.y))
        .chain(current.keypoints.iter().map(|kp| (kp.pt.x + offset, kp.pt.y)))
        .collect();
    recording.log(
        "matches/keypoints",
        &rerun::Points2D::new(rerun_shift(&pts))
            .with_colors([rerun::Color::from_rgb(255, 255, 0)])
            .with_radii([rerun::Radius::new_ui_points(2.0)]),
    )?;

    let lines: Vec<Vec<[f32; 2]>> = current
        .matches
        .iter()
        .filter_map(|m| {
            let from = previous.keypoints.get(m.query_idx)?.pt;
            let to = current.keypoints.get(m.train_idx)?.pt;
            Some(vec![
                [from.x + 0.5, from.y + 0.5],
                [to.x + offset + 0.5, to.y + 0.5],
            ])
        })
        .collect();
    recording.log(
        "matches/lines",
        &rerun::LineStrips2D::new(lines).with_colors(distance_colors(&current.matches)),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_by_side_places_frames() {
        let a = GrayImage::from_pixel(4, 3, image::Luma([10]));
        let b = GrayImage::from_pixel(5, 2, image::Luma([200]));
        let canvas = side_by_side(&a, &b);
        assert_eq!(canvas.dimensions(), (9, 3));
        assert_eq!(canvas.get_pixel(3, 2).0[0], 10);
        assert_eq!(canvas.get_pixel(4, 0).0[0], 200);
        assert_eq!(canvas.get_pixel(4, 2).0[0], 0);
    }

    #[test]
    fn equal_distances_share_a_colour() {
        let matches = [Match::new(0, 0, 3.0), Match::new(1, 1, 3.0)];
        let colors = distance_colors(&matches);
        assert_eq!(colors[0], colors[1]);
    }
}
