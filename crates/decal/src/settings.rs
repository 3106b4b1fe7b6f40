//! User settings persisted as TOML.
//!
//! Every key is optional; missing keys take their defaults. A minimal file
//! might look like:
//!
//! ```toml
//! canvas_size = 1024
//! font = "Arial"
//! anchor = "Bottom Right"
//!
//! [outline]
//! enabled = true
//! width = 6
//! color = "#202020"
//!
//! [export]
//! material = true
//! shader = "csgo_complex.vfx"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use decal_render::font::{FontLibraryConfig, dirs};
use decal_render::{
    Anchor, CANVAS_SIZES, Color, HorizontalAlign, MAX_OUTLINE_WIDTH, RenderRequest,
    is_standard_canvas,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::export::DEFAULT_SHADER;

/// File name inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Outline options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSettings {
    pub enabled: bool,
    pub width: u32,
    pub color: Color,
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 4,
            color: Color::BLACK,
        }
    }
}

/// Output file options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Default file name offered for saving.
    pub filename: String,
    pub mask: bool,
    pub material: bool,
    pub shader: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            filename: "text_layer".to_string(),
            mask: false,
            material: false,
            shader: DEFAULT_SHADER.to_string(),
        }
    }
}

/// Preview options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Quiet period before a changed preview is rendered.
    pub debounce_ms: u64,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self { debounce_ms: 150 }
    }
}

/// Font discovery options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    /// Scanned after the platform font directories.
    pub extra_dirs: Vec<PathBuf>,
    /// Overrides the per-user font cache location.
    pub cache_path: Option<PathBuf>,
}

/// All persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub canvas_size: u32,
    pub font: String,
    pub font_size: u32,
    pub alignment: HorizontalAlign,
    pub anchor: Anchor,
    pub padding: i32,
    pub line_spacing: i32,
    pub text_color: Color,
    pub outline: OutlineSettings,
    pub export: ExportSettings,
    pub preview: PreviewSettings,
    pub fonts: FontSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let request = RenderRequest::default();
        Self {
            canvas_size: request.canvas_size,
            font: request.font_name,
            font_size: request.font_size,
            alignment: request.alignment,
            anchor: request.anchor,
            padding: request.padding,
            line_spacing: request.line_spacing,
            text_color: request.text_color,
            outline: OutlineSettings::default(),
            export: ExportSettings::default(),
            preview: PreviewSettings::default(),
            fonts: FontSettings::default(),
        }
    }
}

impl Settings {
    /// `settings.toml` in the per-user configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", dirs::APP_DIR_NAME)
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
    }

    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let settings: Settings = toml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from [`default_path`](Self::default_path).
    pub fn load_default() -> Result<Self, SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        Self::load(&path)
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values the tool does not offer.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !is_standard_canvas(self.canvas_size) {
            return Err(SettingsError::InvalidCanvas(self.canvas_size));
        }
        Ok(())
    }

    /// Change the canvas size, clamping the font size to the new canvas.
    pub fn set_canvas_size(&mut self, size: u32) -> Result<(), SettingsError> {
        if !CANVAS_SIZES.contains(&size) {
            return Err(SettingsError::InvalidCanvas(size));
        }
        self.canvas_size = size;
        self.font_size = self.font_size.min(size);
        Ok(())
    }

    /// Build a render request for `text` from these settings.
    ///
    /// The font size is clamped to `[1, canvas_size]` and the outline width
    /// to `[0, MAX_OUTLINE_WIDTH]`.
    pub fn render_request(&self, text: impl Into<String>) -> RenderRequest {
        RenderRequest {
            text: text.into(),
            canvas_size: self.canvas_size,
            font_name: self.font.clone(),
            font_size: self.font_size.clamp(1, self.canvas_size.max(1)),
            alignment: self.alignment,
            anchor: self.anchor,
            padding: self.padding,
            line_spacing: self.line_spacing,
            outline_enabled: self.outline.enabled,
            outline_width: self.outline.width.min(MAX_OUTLINE_WIDTH),
            text_color: self.text_color,
            outline_color: self.outline.color,
        }
    }

    /// Font discovery settings: platform directories plus extras, and the
    /// cache location.
    pub fn font_library_config(&self) -> FontLibraryConfig {
        let cache_path = match &self.fonts.cache_path {
            Some(path) => path.clone(),
            None => dirs::default_cache_path(),
        };
        FontLibraryConfig::uncached(dirs::system_font_dirs())
            .with_cache_path(cache_path)
            .with_extra_dirs(self.fonts.extra_dirs.clone())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.preview.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_the_tool() {
        let s = Settings::default();
        assert_eq!(s.canvas_size, 512);
        assert_eq!(s.font, "calibri");
        assert_eq!(s.font_size, 50);
        assert_eq!(s.alignment, HorizontalAlign::Center);
        assert_eq!(s.anchor, Anchor::Center);
        assert_eq!(s.padding, 20);
        assert_eq!(s.line_spacing, 4);
        assert_eq!(s.text_color, Color::WHITE);
        assert_eq!(s.outline, OutlineSettings::default());
        assert_eq!(s.export.filename, "text_layer");
        assert_eq!(s.export.shader, "csgo_static_overlay.vfx");
        assert_eq!(s.debounce(), Duration::from_millis(150));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let s = Settings::load(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            r##"
canvas_size = 1024
anchor = "Bottom Right"
alignment = "left"
text_color = "#FF000080"

[outline]
enabled = true
"##,
        )
        .unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.canvas_size, 1024);
        assert_eq!(s.anchor, Anchor::BottomRight);
        assert_eq!(s.alignment, HorizontalAlign::Left);
        assert_eq!(s.text_color, Color::rgba(255, 0, 0, 128));
        assert!(s.outline.enabled);
        assert_eq!(s.outline.width, 4);
        assert_eq!(s.font, "calibri");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let mut s = Settings::default();
        s.font = "Arial".to_string();
        s.outline.color = Color::rgb(1, 2, 3);
        s.fonts.extra_dirs.push(PathBuf::from("/opt/fonts"));

        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn malformed_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");

        fs::write(&path, "canvas_size = \"big\"").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse { .. })));

        fs::write(&path, "text_color = \"red\"").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse { .. })));

        fs::write(&path, "canvas_size = 300").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::InvalidCanvas(300))));
    }

    #[test]
    fn request_values_are_clamped() {
        let mut s = Settings::default();
        s.font_size = 5000;
        s.outline.width = 99;
        s.outline.enabled = true;
        let req = s.render_request("Hi");
        assert_eq!(req.text, "Hi");
        assert_eq!(req.font_size, 512);
        assert_eq!(req.outline_width, MAX_OUTLINE_WIDTH);
        assert_eq!(req.stroke_width(), MAX_OUTLINE_WIDTH);

        s.font_size = 0;
        assert_eq!(s.render_request("").font_size, 1);
    }

    #[test]
    fn shrinking_canvas_clamps_font_size() {
        let mut s = Settings::default();
        s.font_size = 400;
        s.set_canvas_size(256).unwrap();
        assert_eq!(s.font_size, 256);
        assert!(s.set_canvas_size(100).is_err());
        assert_eq!(s.canvas_size, 256);
    }

    #[test]
    fn extra_font_dirs_are_scanned_last() {
        let mut s = Settings::default();
        s.fonts.extra_dirs.push(PathBuf::from("/opt/fonts"));
        s.fonts.cache_path = Some(PathBuf::from("/tmp/decal-cache.json"));
        let config = s.font_library_config();
        assert_eq!(config.font_dirs.last(), Some(&PathBuf::from("/opt/fonts")));
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/decal-cache.json")));
    }
}
