// Frame decoder: planar YUV 4:2:0 to the NV21 layout face detectors expect

use crate::error::{MoodLensError, Result};
use crate::models::{DetectorInputFrame, PixelFormat, Plane, RawFrame, Rotation};
use image::RgbImage;
use tracing::debug;

/// Maps a sensor orientation in degrees to a detector rotation.
/// Anything other than 0, 90, 180 or 270 falls back to no rotation.
pub fn rotation_from_degrees(degrees: i32) -> Rotation {
    match degrees {
        90 => Rotation::Deg90,
        180 => Rotation::Deg180,
        270 => Rotation::Deg270,
        _ => Rotation::Deg0,
    }
}

/// Relayouts a planar YUV 4:2:0 frame into a single NV21 buffer.
///
/// The first `width * height` bytes are the luma plane, followed by
/// `width * height / 4` interleaved (V, U) pairs in plane-scan order.
/// No resampling happens: the same planes always produce the same bytes.
/// Chroma samples that would land past the last valid index, or that are
/// missing from a short source plane, are skipped.
pub fn yuv420_to_nv21(frame: &RawFrame, rotation: Rotation) -> Result<DetectorInputFrame> {
    if frame.width == 0 || frame.height == 0 {
        return Err(MoodLensError::InvalidFrame(format!(
            "frame dimensions are zero ({}x{})",
            frame.width, frame.height
        )));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let luma_size = width * height;
    let chroma_size = luma_size / 4;
    let total = luma_size * 3 / 2;

    let mut nv21 = vec![0u8; total];
    copy_luma(&frame.y, width, height, &mut nv21[..luma_size])?;

    let chroma_width = (width / 2).max(1);
    let mut index = luma_size;
    for i in 0..chroma_size {
        if index >= total - 1 {
            break;
        }
        let (row, col) = (i / chroma_width, i % chroma_width);
        let (Some(v), Some(u)) = (frame.v.sample(row, col), frame.u.sample(row, col)) else {
            debug!(sample = i, "chroma plane ended early, leaving remaining pairs empty");
            break;
        };
        nv21[index] = v;
        nv21[index + 1] = u;
        index += 2;
    }

    Ok(DetectorInputFrame {
        bytes: nv21,
        width: frame.width,
        height: frame.height,
        rotation,
        format: PixelFormat::Nv21,
    })
}

fn copy_luma(plane: &Plane, width: usize, height: usize, dst: &mut [u8]) -> Result<()> {
    if plane.pixel_stride == 1 && plane.row_stride == width {
        let src = plane.bytes.get(..width * height).ok_or_else(|| {
            MoodLensError::InvalidFrame(format!(
                "luma plane holds {} bytes, frame needs {}",
                plane.bytes.len(),
                width * height
            ))
        })?;
        dst.copy_from_slice(src);
        return Ok(());
    }

    for row in 0..height {
        for col in 0..width {
            dst[row * width + col] = plane.sample(row, col).ok_or_else(|| {
                MoodLensError::InvalidFrame(format!("luma plane ends before row {row}"))
            })?;
        }
    }
    Ok(())
}

/// Converts an RGB image into a packed YUV 4:2:0 frame (BT.601 full range).
///
/// Odd trailing rows or columns are cropped so chroma stays 2x2 subsampled.
pub fn rgb_to_yuv420(image: &RgbImage) -> Result<RawFrame> {
    let width = image.width() & !1;
    let height = image.height() & !1;
    if width == 0 || height == 0 {
        return Err(MoodLensError::InvalidFrame(format!(
            "image too small for 4:2:0 subsampling ({}x{})",
            image.width(),
            image.height()
        )));
    }

    let mut y = Vec::with_capacity((width * height) as usize);
    for row in 0..height {
        for col in 0..width {
            let [r, g, b] = image.get_pixel(col, row).0;
            y.push(luma(r, g, b));
        }
    }

    let chroma_len = ((width / 2) * (height / 2)) as usize;
    let mut u = Vec::with_capacity(chroma_len);
    let mut v = Vec::with_capacity(chroma_len);
    for row in (0..height).step_by(2) {
        for col in (0..width).step_by(2) {
            let mut sum = [0i32; 3];
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let px = image.get_pixel(col + dx, row + dy).0;
                for (acc, channel) in sum.iter_mut().zip(px) {
                    *acc += channel as i32;
                }
            }
            let [r, g, b] = sum.map(|s| (s + 2) / 4);
            u.push(clamp_u8(((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128));
            v.push(clamp_u8(((128 * r - 107 * g - 21 * b + 128) >> 8) + 128));
        }
    }

    Ok(RawFrame::from_packed(width, height, y, u, v))
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    clamp_u8((77 * r as i32 + 150 * g as i32 + 29 * b as i32 + 128) >> 8)
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}
