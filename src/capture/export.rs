//! Exporting finished canvases.
//!
//! The PNG exporter writes `<root>/<directory>/<filename>.png`, replacing any
//! previous capture with the same name. With manifests enabled it also writes
//! `<filename>.json` describing the grid that produced the image.

use chrono::Local;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::capture::compositor::Pixels;
use crate::error::CaptureError;
use crate::grid::{GridPlan, GridPoint, TileSize};

/// What the sequencer knows about a finished session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub plan: GridPlan,
    pub origin: GridPoint,
}

/// Persists a finished canvas.
pub trait Exporter {
    /// Writes `image` and returns where it went.
    fn export(&mut self, image: &Pixels, summary: &SessionSummary) -> Result<PathBuf, CaptureError>;
}

/// Saves canvases as PNG files under a project root.
#[derive(Clone, Debug)]
pub struct PngExporter {
    root: PathBuf,
    directory: String,
    filename: String,
    write_manifest: bool,
}

impl PngExporter {
    pub fn new(root: impl Into<PathBuf>, directory: &str, filename: &str) -> Self {
        Self {
            root: root.into(),
            directory: directory.to_string(),
            filename: filename.to_string(),
            write_manifest: false,
        }
    }

    pub fn with_manifest(mut self, enabled: bool) -> Self {
        self.write_manifest = enabled;
        self
    }

    /// Returns the output directory: `<root>/<directory>/`
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.directory)
    }

    /// Returns the image path: `<root>/<directory>/<filename>.png`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}.png", self.filename))
    }

    /// Returns the manifest path: `<root>/<directory>/<filename>.json`
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}.json", self.filename))
    }
}

impl Exporter for PngExporter {
    fn export(&mut self, image: &Pixels, summary: &SessionSummary) -> Result<PathBuf, CaptureError> {
        let dir = self.output_dir();
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let path = self.output_path();
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| io_error(&path, e))?;
        crate::log(&format!(
            "Saved {}x{} capture to {}",
            image.width(),
            image.height(),
            path.display()
        ));

        if self.write_manifest {
            let manifest_path = self.manifest_path();
            write_manifest(&manifest_path, &path, summary)?;
            crate::log(&format!("Manifest saved: {}", manifest_path.display()));
        }

        Ok(path)
    }
}

fn io_error(path: &Path, source: impl std::error::Error + Send + Sync + 'static) -> CaptureError {
    CaptureError::Io {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

/// JSON description of one capture.
#[derive(Debug, Serialize)]
struct CaptureManifest {
    captured_at: String,
    image: String,
    tile: TileSize,
    steps_x: u32,
    steps_y: u32,
    canvas_width: u32,
    canvas_height: u32,
    origin: GridPoint,
    tiles: Vec<ManifestTile>,
}

#[derive(Debug, Serialize)]
struct ManifestTile {
    index_x: u32,
    index_y: u32,
    world: GridPoint,
    offset: [u32; 2],
}

impl CaptureManifest {
    fn new(image_path: &Path, summary: &SessionSummary) -> Self {
        let plan = &summary.plan;
        let tiles = plan
            .tiles()
            .map(|tile| {
                let (x, y) = plan.canvas_offset(tile);
                ManifestTile {
                    index_x: tile.index_x,
                    index_y: tile.index_y,
                    world: plan.world_position(summary.origin, tile),
                    offset: [x, y],
                }
            })
            .collect();

        Self {
            captured_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            image: image_path.display().to_string(),
            tile: plan.tile,
            steps_x: plan.steps_x,
            steps_y: plan.steps_y,
            canvas_width: plan.canvas_width,
            canvas_height: plan.canvas_height,
            origin: summary.origin,
            tiles,
        }
    }
}

fn write_manifest(path: &Path, image_path: &Path, summary: &SessionSummary) -> Result<(), CaptureError> {
    let manifest = CaptureManifest::new(image_path, summary);
    let json = serde_json::to_string_pretty(&manifest).map_err(|e| io_error(path, e))?;

    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(json.as_bytes()).map_err(|e| io_error(path, e))?;
    Ok(())
}
