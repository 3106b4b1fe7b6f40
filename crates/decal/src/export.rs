//! Writing color images, masks and material descriptors.
//!
//! A single export writes up to three files next to each other:
//!
//! | file                | written when            |
//! |---------------------|-------------------------|
//! | `<prefix>_color.png`| always                  |
//! | `<prefix>_trans.png`| mask or material wanted |
//! | `<prefix>.vmat`     | material wanted         |
//!
//! The material descriptor references both images by a path starting at the
//! `materials/` directory of the game content tree, see
//! [`material_reference`].

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use decal_core::Worker;
use decal_core::logging::{elapsed_ms, targets};
use decal_render::{LayoutEngine, RenderRequest};
use image::ImageFormat;

use crate::error::{ExportError, ExportResult};

/// Suffix of the color image.
pub const COLOR_SUFFIX: &str = "_color.png";
/// Suffix of the mask image.
pub const MASK_SUFFIX: &str = "_trans.png";
/// Extension of the material descriptor.
pub const MATERIAL_EXTENSION: &str = "vmat";

/// Shader written into material descriptors by default.
pub const DEFAULT_SHADER: &str = "csgo_static_overlay.vfx";
/// Shaders offered for material descriptors. Any name is accepted.
pub const KNOWN_SHADERS: [&str; 2] = ["csgo_static_overlay.vfx", "csgo_complex.vfx"];

/// Directory segment that anchors material texture references.
const MATERIALS_SEGMENT: &str = "/materials/";

/// Strip a trailing `_color.png`, or else `.png`, from a chosen save path.
///
/// ```
/// use std::path::{Path, PathBuf};
/// use decal::export::output_prefix;
///
/// assert_eq!(output_prefix(Path::new("out/sign_color.png")), PathBuf::from("out/sign"));
/// assert_eq!(output_prefix(Path::new("out/sign.png")), PathBuf::from("out/sign"));
/// assert_eq!(output_prefix(Path::new("out/sign")), PathBuf::from("out/sign"));
/// ```
pub fn output_prefix(save_path: &Path) -> PathBuf {
    let raw = save_path.as_os_str().to_string_lossy();
    let stripped = raw
        .strip_suffix(COLOR_SUFFIX)
        .or_else(|| raw.strip_suffix(".png"))
        .unwrap_or(&*raw);
    PathBuf::from(stripped)
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path: OsString = prefix.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

/// Texture reference for `image_path` as written into a material.
///
/// If the absolute path contains a `materials` directory, the reference is
/// the path from that directory on. Otherwise it is synthesized as
/// `materials/<parent directory>/<file name>`. Separators are always `/`.
pub fn material_reference(image_path: &Path) -> String {
    let absolute = std::path::absolute(image_path).unwrap_or_else(|_| image_path.to_path_buf());
    let normalized = absolute.to_string_lossy().replace('\\', "/");

    if let Some(idx) = normalized.find(MATERIALS_SEGMENT) {
        return format!("materials/{}", &normalized[idx + MATERIALS_SEGMENT.len()..]);
    }

    let mut parts = normalized.rsplit('/');
    let file_name = parts.next().unwrap_or_default();
    let parent = parts.next().unwrap_or_default();
    format!("materials/{parent}/{file_name}")
}

/// Material descriptor text for a translucent overlay layer.
pub fn material_descriptor(shader: &str, color_ref: &str, translucency_ref: &str) -> String {
    format!(
        "// THIS FILE IS AUTO-GENERATED\n\
         \n\
         Layer0\n\
         {{\n\
         \tshader \"{shader}\"\n\
         \n\
         \t//---- Blend Mode ----\n\
         \tF_BLEND_MODE 1 // Translucent\n\
         \n\
         \t//---- Color ----\n\
         \tg_flModelTintAmount \"1.000\"\n\
         \tg_vColorTint \"[1.000000 1.000000 1.000000 0.000000]\"\n\
         \tTextureColor \"{color_ref}\"\n\
         \n\
         \t//---- Fog ----\n\
         \tg_bFogEnabled \"1\"\n\
         \n\
         \t//---- Translucent ----\n\
         \tg_flOpacityScale \"1.000\"\n\
         \tTextureTranslucency \"{translucency_ref}\"\n\
         }}\n"
    )
}

/// One resolved export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub request: RenderRequest,
    /// Output path without suffix, see [`output_prefix`].
    pub prefix: PathBuf,
    /// Write `<prefix>_trans.png`.
    pub mask: bool,
    /// Write `<prefix>.vmat` (implies the mask).
    pub material: bool,
    pub shader: String,
}

impl ExportJob {
    /// Export only the color image.
    pub fn new(request: RenderRequest, prefix: impl Into<PathBuf>) -> Self {
        Self {
            request,
            prefix: prefix.into(),
            mask: false,
            material: false,
            shader: DEFAULT_SHADER.to_string(),
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: bool) -> Self {
        self.mask = mask;
        self
    }

    /// Also write a material descriptor using `shader`.
    #[must_use]
    pub fn with_material(mut self, shader: impl Into<String>) -> Self {
        self.material = true;
        self.shader = shader.into();
        self
    }

    /// Whether the mask image is written.
    pub fn writes_mask(&self) -> bool {
        self.mask || self.material
    }

    pub fn color_path(&self) -> PathBuf {
        with_suffix(&self.prefix, COLOR_SUFFIX)
    }

    pub fn mask_path(&self) -> PathBuf {
        with_suffix(&self.prefix, MASK_SUFFIX)
    }

    pub fn material_path(&self) -> PathBuf {
        with_suffix(&self.prefix, &format!(".{MATERIAL_EXTENSION}"))
    }
}

/// Files written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub color: PathBuf,
    pub mask: Option<PathBuf>,
    pub material: Option<PathBuf>,
}

impl ExportOutcome {
    pub fn files(&self) -> Vec<&Path> {
        std::iter::once(self.color.as_path())
            .chain(self.mask.as_deref())
            .chain(self.material.as_deref())
            .collect()
    }
}

/// The ten-digit batch: one export per digit `0`..`9`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    /// Style template; text and font size are replaced per digit.
    pub request: RenderRequest,
    pub directory: PathBuf,
    pub mask: bool,
    pub material: bool,
    pub shader: String,
}

impl BatchJob {
    pub fn new(request: RenderRequest, directory: impl Into<PathBuf>) -> Self {
        Self {
            request,
            directory: directory.into(),
            mask: false,
            material: false,
            shader: DEFAULT_SHADER.to_string(),
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: bool) -> Self {
        self.mask = mask;
        self
    }

    #[must_use]
    pub fn with_material(mut self, shader: impl Into<String>) -> Self {
        self.material = true;
        self.shader = shader.into();
        self
    }

    /// The export for a single digit: the digit as text, drawn at the full
    /// canvas size, written to `<directory>/<digit>`.
    pub fn job_for(&self, digit: u8) -> ExportJob {
        let mut request = self.request.clone();
        request.text = digit.to_string();
        request.font_size = request.canvas_size;
        ExportJob {
            request,
            prefix: self.directory.join(digit.to_string()),
            mask: self.mask,
            material: self.material,
            shader: self.shader.clone(),
        }
    }
}

/// Per-digit results of a batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub exported: Vec<(u8, ExportOutcome)>,
    pub failed: Vec<(u8, ExportError)>,
}

impl BatchOutcome {
    /// Whether every digit was exported.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renders export jobs and writes their files.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    engine: Arc<LayoutEngine>,
}

impl ExportPipeline {
    pub fn new(engine: Arc<LayoutEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<LayoutEngine> {
        &self.engine
    }

    /// Render and write one job.
    ///
    /// Files written before a failure are left in place.
    pub fn export(&self, job: &ExportJob) -> ExportResult<ExportOutcome> {
        let start = Instant::now();
        let rendered = self.engine.render(&job.request)?;

        let color = job.color_path();
        rendered
            .color
            .save_with_format(&color, ImageFormat::Png)
            .map_err(|source| ExportError::Image {
                path: color.clone(),
                source,
            })?;

        let mask = if job.writes_mask() {
            let path = job.mask_path();
            rendered
                .mask
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|source| ExportError::Image {
                    path: path.clone(),
                    source,
                })?;
            Some(path)
        } else {
            None
        };

        let material = match (&mask, job.material) {
            (Some(mask_path), true) => {
                let path = job.material_path();
                let text = material_descriptor(
                    &job.shader,
                    &material_reference(&color),
                    &material_reference(mask_path),
                );
                fs::write(&path, text).map_err(|e| ExportError::io(&path, e))?;
                Some(path)
            }
            _ => None,
        };

        tracing::info!(
            target: targets::EXPORT,
            prefix = %job.prefix.display(),
            mask = mask.is_some(),
            material = material.is_some(),
            elapsed_ms = elapsed_ms(start),
            "export complete"
        );
        Ok(ExportOutcome {
            color,
            mask,
            material,
        })
    }

    /// Export the digits `0`..`9` into the batch directory.
    ///
    /// The directory is created if needed; failing to create it aborts the
    /// batch. Failures of individual digits are logged and collected.
    pub fn export_numbers(&self, batch: &BatchJob) -> ExportResult<BatchOutcome> {
        let start = Instant::now();
        fs::create_dir_all(&batch.directory)
            .map_err(|e| ExportError::io(&batch.directory, e))?;

        let mut outcome = BatchOutcome::default();
        for digit in 0..=9u8 {
            match self.export(&batch.job_for(digit)) {
                Ok(files) => outcome.exported.push((digit, files)),
                Err(e) => {
                    tracing::error!(target: targets::BATCH, digit, error = %e, "digit export failed");
                    outcome.failed.push((digit, e));
                }
            }
        }

        tracing::info!(
            target: targets::BATCH,
            directory = %batch.directory.display(),
            exported = outcome.exported.len(),
            failed = outcome.failed.len(),
            elapsed_ms = elapsed_ms(start),
            "batch export complete"
        );
        Ok(outcome)
    }

    /// Run [`export`](Self::export) on `worker`; `callback` receives the
    /// result on the worker thread.
    pub fn submit<C>(&self, worker: &Worker, job: ExportJob, callback: C) -> ExportResult<()>
    where
        C: FnOnce(ExportResult<ExportOutcome>) + Send + 'static,
    {
        let pipeline = self.clone();
        worker.send(move || callback(pipeline.export(&job)))?;
        Ok(())
    }

    /// Run [`export_numbers`](Self::export_numbers) on `worker`.
    pub fn submit_numbers<C>(&self, worker: &Worker, batch: BatchJob, callback: C) -> ExportResult<()>
    where
        C: FnOnce(ExportResult<BatchOutcome>) + Send + 'static,
    {
        let pipeline = self.clone();
        worker.send(move || callback(pipeline.export_numbers(&batch)))?;
        Ok(())
    }
}
