use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use subtitle_extract_frames::{FrameFormat, FrameLayout};
use subtitle_extract_ocr::{OcrError, Replacer};
#[cfg(feature = "ocr-tesseract")]
use subtitle_extract_ocr::TesseractOptions;
use subtitle_extract_segment::{
    BorderConfig, Connectivity, EdgeExclusion, OptimizerConfig, RegionFormat, SegmenterConfig,
};
use subtitle_extract_types::{
    Area, ColorGroup, FrameClock, Margin, Range, RelativeValue, ReplaceRule,
};
use thiserror::Error;

use crate::subtitle::SubtitleFormat;

pub const DEFAULT_CONFIG_PATH: &str = "subtitle.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("config file {} does not exist", path.display())]
    NotFound { path: PathBuf },
    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid replace rule in {field}: {source}")]
    Replace {
        field: &'static str,
        #[source]
        source: OcrError,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub ffmpeg: FfmpegConfig,
    pub tesseract: TesseractConfig,
    pub slice: SliceConfig,
    pub binarize: BinarizeConfig,
    pub check: CheckConfig,
    pub ocr: OcrConfig,
    pub convert: ConvertConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FfmpegConfig {
    pub filters: Vec<String>,
    pub append_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    pub langs: Vec<String>,
    pub psm: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            langs: vec!["eng".to_string()],
            psm: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SliceConfig {
    pub fps: u32,
    pub fps_factor: u32,
    /// Seconds between sampled timestamps.
    pub frame_interval: u64,
    pub format: String,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            fps: 1,
            fps_factor: 1,
            frame_interval: 1,
            format: FrameFormat::Jpg.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BinarizeConfig {
    pub crop: Area,
    pub text_colors: Vec<ColorGroup>,
    pub optimizer: OptimizerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerSection {
    pub connectivity: u32,
    pub size: Range,
    pub width: Range,
    pub height: Range,
    pub border: BorderSection,
    pub no_on_edge: NoOnEdgeSection,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            connectivity: 8,
            size: Range::unbounded(),
            width: Range::unbounded(),
            height: Range::unbounded(),
            border: BorderSection::default(),
            no_on_edge: NoOnEdgeSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BorderSection {
    pub colors: Vec<ColorGroup>,
    pub level: RelativeValue,
}

impl Default for BorderSection {
    fn default() -> Self {
        Self {
            colors: Vec::new(),
            level: RelativeValue::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoOnEdgeSection {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckConfig {
    /// Opacity of the debug mask over the source frame, in `[0, 1]`.
    pub mask_level: f64,
    pub cropped: ColorGroup,
    pub background: ColorGroup,
    pub text: ColorGroup,
    pub discarded: ColorGroup,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            mask_level: 0.8,
            cropped: ColorGroup::exact(0x7f, 0x7f, 0x7f),
            background: ColorGroup::exact(0x00, 0x00, 0x00),
            text: ColorGroup::exact(0xff, 0x00, 0x00),
            discarded: ColorGroup::exact(0x00, 0x00, 0xff),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrConfig {
    /// Pixel difference, relative to the crop area, under which the previous
    /// frame's text is reused. Zero disables the cache.
    pub cache: RelativeValue,
    pub margin: Margin,
    pub format: String,
    pub jpg_quality: u8,
    pub replace: Vec<ReplaceRule>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            cache: RelativeValue::ZERO,
            margin: Margin {
                x: RelativeValue::absolute(20),
                y: RelativeValue::absolute(20),
            },
            format: "jpg".to_string(),
            jpg_quality: 100,
            replace: vec![ReplaceRule::literal("\n", " ")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertConfig {
    pub replace: Vec<ReplaceRule>,
    pub format: String,
    pub merge: RelativeValue,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            replace: Vec::new(),
            format: SubtitleFormat::Srt.to_string(),
            merge: RelativeValue::ZERO,
        }
    }
}

impl Config {
    /// Rejects values that would only fail once a command is running.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connectivity()?;
        self.frame_clock()?;
        self.frame_format()?;
        self.region_format()?;
        self.subtitle_format()?;
        if !(0.0..=1.0).contains(&self.check.mask_level) {
            return Err(ConfigError::invalid("check.maskLevel", self.check.mask_level));
        }
        self.ocr_replacer()?;
        self.convert_replacer()?;
        Ok(())
    }

    fn connectivity(&self) -> Result<Connectivity, ConfigError> {
        let value = self.binarize.optimizer.connectivity;
        Connectivity::try_from(value)
            .map_err(|_| ConfigError::invalid("binarize.optimizer.connectivity", value))
    }

    pub fn frame_clock(&self) -> Result<FrameClock, ConfigError> {
        let slice = &self.slice;
        if slice.fps == 0 {
            return Err(ConfigError::invalid("slice.fps", slice.fps));
        }
        if slice.fps_factor == 0 {
            return Err(ConfigError::invalid("slice.fpsFactor", slice.fps_factor));
        }
        if slice.frame_interval == 0 {
            return Err(ConfigError::invalid(
                "slice.frameInterval",
                slice.frame_interval,
            ));
        }
        FrameClock::new(
            slice.fps,
            slice.fps_factor,
            Duration::from_secs(slice.frame_interval),
        )
        .map_err(|err| ConfigError::invalid("slice", err))
    }

    pub fn frame_format(&self) -> Result<FrameFormat, ConfigError> {
        self.slice
            .format
            .parse()
            .map_err(|_| ConfigError::invalid("slice.format", &self.slice.format))
    }

    pub fn frame_layout(&self, dir: &Path) -> Result<FrameLayout, ConfigError> {
        Ok(FrameLayout::new(dir, self.frame_format()?))
    }

    pub fn region_format(&self) -> Result<RegionFormat, ConfigError> {
        let format: FrameFormat = self
            .ocr
            .format
            .parse()
            .map_err(|_| ConfigError::invalid("ocr.format", &self.ocr.format))?;
        match format {
            FrameFormat::Png => Ok(RegionFormat::Png),
            FrameFormat::Jpg => {
                let quality = self.ocr.jpg_quality;
                if !(1..=100).contains(&quality) {
                    return Err(ConfigError::invalid("ocr.jpgQuality", quality));
                }
                Ok(RegionFormat::Jpeg { quality })
            }
        }
    }

    pub fn subtitle_format(&self) -> Result<SubtitleFormat, ConfigError> {
        self.convert
            .format
            .parse()
            .map_err(|_| ConfigError::invalid("convert.format", &self.convert.format))
    }

    pub fn segmenter_config(&self) -> Result<SegmenterConfig, ConfigError> {
        let binarize = &self.binarize;
        let optimizer = &binarize.optimizer;
        let edges = optimizer.no_on_edge;
        Ok(SegmenterConfig {
            crop: binarize.crop,
            text_colors: binarize.text_colors.clone(),
            optimizer: OptimizerConfig {
                connectivity: self.connectivity()?,
                size: optimizer.size,
                width: optimizer.width,
                height: optimizer.height,
                border: BorderConfig {
                    colors: optimizer.border.colors.clone(),
                    level: optimizer.border.level,
                },
                no_on_edge: EdgeExclusion {
                    left: edges.left,
                    right: edges.right,
                    top: edges.top,
                    bottom: edges.bottom,
                },
            },
            margin: self.ocr.margin,
        })
    }

    pub fn ocr_replacer(&self) -> Result<Replacer, ConfigError> {
        Replacer::new(&self.ocr.replace).map_err(|source| ConfigError::Replace {
            field: "ocr.replace",
            source,
        })
    }

    pub fn convert_replacer(&self) -> Result<Replacer, ConfigError> {
        Replacer::new(&self.convert.replace).map_err(|source| ConfigError::Replace {
            field: "convert.replace",
            source,
        })
    }

    #[cfg(feature = "ocr-tesseract")]
    pub fn tesseract_options(&self) -> TesseractOptions {
        TesseractOptions {
            langs: self.tesseract.langs.clone(),
            psm: self.tesseract.psm,
            ..TesseractOptions::default()
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let path = expand_home_path(path);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config: Config =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
    config.validate()?;
    log::debug!("loaded configuration from {}", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let path = expand_home_path(path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut contents = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    contents.push('\n');
    fs::write(&path, contents).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

pub fn expand_home_path(path: &Path) -> PathBuf {
    let Some(value) = path.to_str() else {
        return path.to_path_buf();
    };
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/")
        && let Some(base) = BaseDirs::new()
    {
        return base.home_dir().join(stripped);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_a_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("subtitle.json");
        let written = save_config(&path, &Config::default()).unwrap();
        assert_eq!(written, path);

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn default_file_uses_textual_forms() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["ocr"]["margin"]["x"], "0%+20");
        assert_eq!(json["ocr"]["jpgQuality"], 100);
        assert_eq!(json["check"]["cropped"], "#7f7f7f");
        assert_eq!(json["binarize"]["optimizer"]["size"]["max"], "100%+0");
        assert_eq!(json["binarize"]["optimizer"]["noOnEdge"]["left"], false);
        assert_eq!(json["slice"]["fpsFactor"], 1);
        assert_eq!(json["convert"]["format"], "srt");
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(
            r##"{"binarize": {"textColors": ["#ffffff/10"], "optimizer": {"connectivity": 4}}}"##,
        )
        .unwrap();
        config.validate().unwrap();
        let segmenter = config.segmenter_config().unwrap();
        assert_eq!(segmenter.optimizer.connectivity, Connectivity::Four);
        assert_eq!(segmenter.text_colors, vec![ColorGroup::new(255, 255, 255, 10)]);
        assert_eq!(config.tesseract, TesseractConfig::default());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.binarize.optimizer.connectivity = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "binarize.optimizer.connectivity", .. })
        ));

        let mut config = Config::default();
        config.slice.fps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.check.mask_level = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ocr.jpg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.convert.format = "ass".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ocr.replace.push(ReplaceRule::pattern("[", ""));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Replace { field: "ocr.replace", .. })
        ));
    }

    #[test]
    fn malformed_relative_value_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtitle.json");
        fs::write(&path, r#"{"ocr": {"cache": "5"}}"#).unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn png_region_format_ignores_quality() {
        let mut config = Config::default();
        config.ocr.format = "png".into();
        config.ocr.jpg_quality = 0;
        assert_eq!(config.region_format().unwrap(), RegionFormat::Png);
    }
}
