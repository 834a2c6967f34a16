/*!
    Raw frame dumping.
*/

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use hwdec_decode::DecodedFrame;
use hwdec_types::{OutputSurfaceInfo, Result};

/**
    Writes the visible planes of decoded frames to a raw file.

    Each frame is written plane by plane with the rows packed tightly,
    so padding and pitch never reach the file. Chroma planes are written
    in their surface layout (semi-planar chroma stays interleaved).

    The file is opened on the first frame. When a frame arrives flagged as
    the first after a reconfiguration, the current file is closed and the
    following frames go to `<stem>_<width>_<height>_<n>.<ext>` next to the
    configured path, where `n` counts reconfigurations.
*/
#[derive(Debug)]
pub struct FrameWriter {
    base: PathBuf,
    current: PathBuf,
    file: Option<BufWriter<File>>,
    extra_files: u32,
    frames_written: usize,
    files: Vec<PathBuf>,
}

impl FrameWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let base = path.as_ref().to_path_buf();
        Self {
            current: base.clone(),
            base,
            file: None,
            extra_files: 0,
            frames_written: 0,
            files: Vec::new(),
        }
    }

    /**
        Path the next frame is written to.
    */
    pub fn path(&self) -> &Path {
        &self.current
    }

    /**
        Every file opened so far, in order.
    */
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /**
        Copy `frame` to host memory and write its visible planes.
    */
    pub fn write_frame(
        &mut self,
        frame: &DecodedFrame,
        info: &OutputSurfaceInfo,
        reconfigured: bool,
    ) -> Result<()> {
        let bytes = frame.copy_to_host()?;
        self.write_surface(&bytes, info, reconfigured)
    }

    /**
        Write the visible planes of a surface already in host memory.
    */
    pub fn write_surface(
        &mut self,
        bytes: &[u8],
        info: &OutputSurfaceInfo,
        reconfigured: bool,
    ) -> Result<()> {
        if reconfigured {
            self.next_file(info)?;
        }
        let file = match &mut self.file {
            Some(file) => file,
            file => {
                info!(path = %self.current.display(), "writing frames");
                self.files.push(self.current.clone());
                file.insert(BufWriter::new(File::create(&self.current)?))
            }
        };

        for plane in 0..info.plane_count() {
            let Some(layout) = info.plane_layout(plane) else {
                continue;
            };
            for row in layout.rows(bytes)? {
                file.write_all(row)?;
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    /**
        Flush buffered frames to disk.
    */
    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }

    fn next_file(&mut self, info: &OutputSurfaceInfo) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.extra_files += 1;
        self.current = suffixed_path(
            &self.base,
            info.output_width,
            info.output_height,
            self.extra_files,
        );
        debug!(path = %self.current.display(), "output switched after reconfiguration");
        Ok(())
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/**
    `dir/name.ext` becomes `dir/name_<width>_<height>_<n>.ext`; a path
    without an extension just gets the suffix appended.
*/
fn suffixed_path(base: &Path, width: u32, height: u32, n: u32) -> PathBuf {
    let suffix = format!("_{width}_{height}_{n}");
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    base.with_file_name(name)
}
