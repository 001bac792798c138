//! Binary PPM (P6) output for rendered frames

use std::fs;
use std::path::Path;

use crate::error::{LayoutError, LayoutResult};

/// Encode tightly packed RGBA pixels as a binary PPM, dropping alpha
pub fn encode_ppm(width: u32, height: u32, rgba: &[u8]) -> LayoutResult<Vec<u8>> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(LayoutError::DeviceResource(format!(
            "pixel buffer holds {} bytes, expected {} for {}x{}",
            rgba.len(),
            expected,
            width,
            height
        )));
    }

    let header = format!("P6\n{} {}\n255\n", width, height);
    let mut out = Vec::with_capacity(header.len() + expected / 4 * 3);
    out.extend_from_slice(header.as_bytes());
    for pixel in rgba.chunks_exact(4) {
        out.extend_from_slice(&pixel[..3]);
    }
    Ok(out)
}

/// Encode and write to `path`
pub fn write_ppm(path: &Path, width: u32, height: u32, rgba: &[u8]) -> LayoutResult<()> {
    let bytes = encode_ppm(width, height, rgba)?;
    fs::write(path, bytes)?;
    Ok(())
}
