/*!
    MD5 digest over decoded frames.
*/

use std::fs;
use std::path::Path;

use md5::{Digest, Md5};
use tracing::{debug, info, warn};

use hwdec_decode::DecodedFrame;
use hwdec_types::{Error, OutputSurfaceInfo, Result};

/**
    Running MD5 digest over the visible image of every frame.

    Frames are hashed in a stacked planar layout: the luma plane, then the
    Cb plane, then the Cr plane, each with its rows packed tightly.
    Semi-planar chroma is de-interleaved first. Samples stored in the most
    significant bits of a 16-bit container are shifted down to their true
    bit depth, so digests match those of reference decoders that emit
    LSB-aligned output.
*/
#[derive(Clone, Debug, Default)]
pub struct FrameChecksum {
    hasher: Md5,
    frames: usize,
    scratch: Vec<u8>,
}

impl FrameChecksum {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Number of frames folded into the digest.
    */
    pub fn frames(&self) -> usize {
        self.frames
    }

    /**
        Copy `frame` to host memory and fold it into the digest.
    */
    pub fn update_frame(&mut self, frame: &DecodedFrame, info: &OutputSurfaceInfo) -> Result<()> {
        let bytes = frame.copy_to_host()?;
        self.update(&bytes, info)
    }

    /**
        Fold a surface already in host memory into the digest.
    */
    pub fn update(&mut self, bytes: &[u8], info: &OutputSurfaceInfo) -> Result<()> {
        let bpp = info.bytes_per_pixel as usize;
        let shift = if bpp == 2 && info.surface_format.is_msb_aligned() {
            16u32.saturating_sub(info.bit_depth)
        } else {
            0
        };

        if let Some(luma) = info.plane_layout(0) {
            for row in luma.rows(bytes)? {
                self.put(row, shift);
            }
        }

        if info.surface_format.is_semi_planar() {
            if let Some(chroma) = info.plane_layout(1) {
                let mut cb = Vec::with_capacity(chroma.row_bytes / 2 * chroma.rows);
                let mut cr = Vec::with_capacity(cb.capacity());
                for row in chroma.rows(bytes)? {
                    for pair in row.chunks_exact(2 * bpp) {
                        cb.extend_from_slice(&pair[..bpp]);
                        cr.extend_from_slice(&pair[bpp..]);
                    }
                }
                self.put(&cb, shift);
                self.put(&cr, shift);
            }
        } else {
            for plane in 1..info.plane_count() {
                let Some(layout) = info.plane_layout(plane) else {
                    continue;
                };
                for row in layout.rows(bytes)? {
                    self.put(row, shift);
                }
            }
        }

        self.frames += 1;
        Ok(())
    }

    /**
        Finish the digest and return it as lowercase hex.
    */
    pub fn finalize(self) -> String {
        debug!(frames = self.frames, "finalizing checksum");
        hex::encode(self.hasher.finalize())
    }

    fn put(&mut self, samples: &[u8], shift: u32) {
        if shift == 0 {
            self.hasher.update(samples);
            return;
        }
        self.scratch.clear();
        for sample in samples.chunks_exact(2) {
            let value = u16::from_le_bytes([sample[0], sample[1]]) >> shift;
            self.scratch.extend_from_slice(&value.to_le_bytes());
        }
        self.hasher.update(&self.scratch);
    }
}

/**
    Compare a hex digest against the first line of a reference file.

    Fails if the file cannot be read or does not start with a 16 byte hex
    digest; a well-formed but different digest returns `Ok(false)`.
*/
pub fn verify_against_file(digest: &str, reference: impl AsRef<Path>) -> Result<bool> {
    let reference = reference.as_ref();
    let contents = fs::read_to_string(reference)?;
    let line = contents.lines().next().unwrap_or_default().trim();
    let expected = parse_digest(line).ok_or_else(|| {
        Error::invalid_parameter(format!(
            "{} does not start with an MD5 digest",
            reference.display()
        ))
    })?;
    let actual = parse_digest(digest)
        .ok_or_else(|| Error::invalid_parameter(format!("not an MD5 digest: {digest}")))?;

    let matched = expected == actual;
    if matched {
        info!(digest, "MD5 digest matches the reference");
    } else {
        warn!(digest, reference = line, "MD5 digest does not match the reference");
    }
    Ok(matched)
}

fn parse_digest(text: &str) -> Option<[u8; 16]> {
    let mut out = [0u8; 16];
    hex::decode_to_slice(text.get(..32)?, &mut out).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use hwdec_types::{MemoryKind, SurfaceFormat};

    use super::*;

    fn surface(format: SurfaceFormat, width: u32, height: u32, bpp: u32) -> OutputSurfaceInfo {
        let pitch = width * bpp;
        OutputSurfaceInfo {
            output_width: width,
            output_height: height,
            output_pitch: pitch,
            output_vstride: height,
            chroma_width: width / 2,
            chroma_height: height / 2,
            bytes_per_pixel: bpp,
            bit_depth: if bpp == 2 { 10 } else { 8 },
            num_chroma_planes: format.chroma_plane_count(),
            output_surface_size_in_bytes: u64::from(pitch * height * 3 / 2),
            surface_format: format,
            mem_kind: MemoryKind::HostCopied,
            visible_left: 0,
            visible_top: 0,
        }
    }

    fn md5_of(bytes: &[u8]) -> String {
        hex::encode(Md5::digest(bytes))
    }

    #[test]
    fn empty_digest() {
        assert_eq!(
            FrameChecksum::new().finalize(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn semi_planar_chroma_is_stacked() {
        let info = surface(SurfaceFormat::Nv12, 4, 2, 1);
        let nv12 = [1, 2, 3, 4, 5, 6, 7, 8, 10, 20, 11, 21];
        let mut checksum = FrameChecksum::new();
        checksum.update(&nv12, &info).unwrap();
        assert_eq!(checksum.frames(), 1);
        assert_eq!(
            checksum.finalize(),
            md5_of(&[1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 20, 21])
        );
    }

    #[test]
    fn planar_matches_equivalent_semi_planar() {
        let planar = surface(SurfaceFormat::Yuv420, 4, 2, 1);
        let mut a = FrameChecksum::new();
        a.update(&[1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 20, 21], &planar)
            .unwrap();

        let semi = surface(SurfaceFormat::Nv12, 4, 2, 1);
        let mut b = FrameChecksum::new();
        b.update(&[1, 2, 3, 4, 5, 6, 7, 8, 10, 20, 11, 21], &semi)
            .unwrap();

        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn msb_aligned_samples_are_shifted() {
        let info = surface(SurfaceFormat::P016, 2, 2, 2);
        // 10-bit value 0x3FF stored as 0xFFC0, chroma pair 0x0040 / 0x0080
        let mut p016 = Vec::new();
        for _ in 0..4 {
            p016.extend_from_slice(&0xFFC0u16.to_le_bytes());
        }
        p016.extend_from_slice(&0x0040u16.to_le_bytes());
        p016.extend_from_slice(&0x0080u16.to_le_bytes());

        let mut expected = Vec::new();
        for _ in 0..4 {
            expected.extend_from_slice(&0x03FFu16.to_le_bytes());
        }
        expected.extend_from_slice(&0x0001u16.to_le_bytes());
        expected.extend_from_slice(&0x0002u16.to_le_bytes());

        let mut checksum = FrameChecksum::new();
        checksum.update(&p016, &info).unwrap();
        assert_eq!(checksum.finalize(), md5_of(&expected));
    }

    #[test]
    fn lsb_aligned_samples_are_kept() {
        let info = surface(SurfaceFormat::Yuv420_16Bit, 2, 2, 2);
        let bytes: Vec<u8> = (0..12).collect();
        let mut checksum = FrameChecksum::new();
        checksum.update(&bytes, &info).unwrap();
        assert_eq!(checksum.finalize(), md5_of(&bytes));
    }

    #[test]
    fn verify_reads_the_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.md5");
        let digest = FrameChecksum::new().finalize();

        fs::write(&path, format!("{}\nsecond line\n", digest.to_uppercase())).unwrap();
        assert!(verify_against_file(&digest, &path).unwrap());

        fs::write(&path, "00000000000000000000000000000000\n").unwrap();
        assert!(!verify_against_file(&digest, &path).unwrap());

        fs::write(&path, "not a digest\n").unwrap();
        assert!(verify_against_file(&digest, &path).is_err());
        assert!(verify_against_file(&digest, dir.path().join("missing")).is_err());
    }
}
