//! Snapshot configuration
//!
//! `SnapshotConfig` is what callers write (JSON friendly, with the boolean
//! shorthands); `SnapshotOptions` is the resolved, immutable bundle the walker
//! threads through every call.

use crate::error::{Result, SnapshotError};
use crate::privacy::{ClassMatcher, PrivacyRule};
use dom::DataUrlOptions;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type MaskTextFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type MaskInputFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type KeepIframeSrcFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Per input type masking switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskInputOptions {
    pub color: bool,
    pub date: bool,
    #[serde(rename = "datetime-local")]
    pub datetime_local: bool,
    pub email: bool,
    pub month: bool,
    pub number: bool,
    pub range: bool,
    pub search: bool,
    pub tel: bool,
    pub text: bool,
    pub time: bool,
    pub url: bool,
    pub week: bool,
    pub textarea: bool,
    pub select: bool,
    pub password: bool,
}

impl MaskInputOptions {
    /// What `maskAllInputs: true` expands to
    pub fn all() -> Self {
        Self {
            color: true,
            date: true,
            datetime_local: true,
            email: true,
            month: true,
            number: true,
            range: true,
            search: true,
            tel: true,
            text: true,
            time: true,
            url: true,
            week: true,
            textarea: true,
            select: true,
            password: true,
        }
    }

    /// What `maskAllInputs: false` expands to
    pub fn password_only() -> Self {
        Self {
            password: true,
            ..Self::default()
        }
    }

    /// Lookup by tag name or input type (lower case)
    pub fn is_enabled(&self, key: &str) -> bool {
        match key {
            "color" => self.color,
            "date" => self.date,
            "datetime-local" => self.datetime_local,
            "email" => self.email,
            "month" => self.month,
            "number" => self.number,
            "range" => self.range,
            "search" => self.search,
            "tel" => self.tel,
            "text" => self.text,
            "time" => self.time,
            "url" => self.url,
            "week" => self.week,
            "textarea" => self.textarea,
            "select" => self.select,
            "password" => self.password,
            _ => false,
        }
    }
}

/// Slim DOM suppression categories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlimDomOptions {
    pub script: bool,
    pub comment: bool,
    pub head_favicon: bool,
    pub head_whitespace: bool,
    pub head_meta_desc_keywords: bool,
    pub head_meta_social: bool,
    pub head_meta_robots: bool,
    pub head_meta_http_equiv: bool,
    pub head_meta_authorship: bool,
    pub head_meta_verification: bool,
}

impl SlimDomOptions {
    /// `slimDOM: true`
    pub fn standard() -> Self {
        Self {
            script: true,
            comment: true,
            head_favicon: true,
            head_whitespace: true,
            head_meta_desc_keywords: false,
            head_meta_social: true,
            head_meta_robots: true,
            head_meta_http_equiv: true,
            head_meta_authorship: true,
            head_meta_verification: true,
        }
    }

    /// `slimDOM: "all"`
    pub fn all() -> Self {
        Self {
            head_meta_desc_keywords: true,
            ..Self::standard()
        }
    }
}

/// `maskAllInputs`: a flag or an explicit map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskAllInputs {
    Flag(bool),
    Custom(MaskInputOptions),
}

impl Default for MaskAllInputs {
    fn default() -> Self {
        MaskAllInputs::Flag(false)
    }
}

impl MaskAllInputs {
    pub fn resolve(&self) -> MaskInputOptions {
        match self {
            MaskAllInputs::Flag(true) => MaskInputOptions::all(),
            MaskAllInputs::Flag(false) => MaskInputOptions::password_only(),
            MaskAllInputs::Custom(options) => options.clone(),
        }
    }
}

/// `slimDOM`: a flag, the `"all"` preset, or an explicit map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlimDom {
    Flag(bool),
    Preset(String),
    Custom(SlimDomOptions),
}

impl Default for SlimDom {
    fn default() -> Self {
        SlimDom::Flag(false)
    }
}

impl SlimDom {
    pub fn resolve(&self) -> Result<SlimDomOptions> {
        match self {
            SlimDom::Flag(true) => Ok(SlimDomOptions::standard()),
            SlimDom::Flag(false) => Ok(SlimDomOptions::default()),
            SlimDom::Preset(preset) if preset == "all" => Ok(SlimDomOptions::all()),
            SlimDom::Preset(other) => Err(SnapshotError::InvalidOption {
                name: "slimDOM".to_string(),
                value: other.clone(),
            }),
            SlimDom::Custom(options) => Ok(options.clone()),
        }
    }
}

/// Class rule as written in config: `"rr-block"` or `{"pattern": "^rr-"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassRule {
    Name(String),
    Pattern { pattern: String },
}

impl ClassRule {
    fn compile(&self) -> Result<ClassMatcher> {
        Ok(match self {
            ClassRule::Name(name) => ClassMatcher::Name(name.clone()),
            ClassRule::Pattern { pattern } => ClassMatcher::Pattern(Regex::new(pattern)?),
        })
    }
}

/// Caller-facing snapshot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotConfig {
    pub block_class: ClassRule,
    pub block_selector: Option<String>,
    pub mask_text_class: ClassRule,
    pub mask_text_selector: Option<String>,
    pub inline_stylesheet: bool,
    pub mask_all_inputs: MaskAllInputs,
    #[serde(rename = "slimDOM")]
    pub slim_dom: SlimDom,
    #[serde(rename = "dataURLOptions")]
    pub data_url_options: DataUrlOptions,
    pub inline_images: bool,
    pub record_canvas: bool,
    pub preserve_white_space: bool,
    pub enable_strict_privacy: bool,
    pub iframe_load_timeout_ms: u64,
    pub stylesheet_load_timeout_ms: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            block_class: ClassRule::Name("rr-block".to_string()),
            block_selector: None,
            mask_text_class: ClassRule::Name("rr-mask".to_string()),
            mask_text_selector: None,
            inline_stylesheet: true,
            mask_all_inputs: MaskAllInputs::default(),
            slim_dom: SlimDom::default(),
            data_url_options: DataUrlOptions::default(),
            inline_images: false,
            record_canvas: false,
            preserve_white_space: true,
            enable_strict_privacy: false,
            iframe_load_timeout_ms: 5000,
            stylesheet_load_timeout_ms: 5000,
        }
    }
}

impl SnapshotConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compile class patterns and expand shorthands
    pub fn resolve(&self) -> Result<SnapshotOptions> {
        Ok(SnapshotOptions {
            block: PrivacyRule::new(self.block_class.compile()?, self.block_selector.clone()),
            mask_text: PrivacyRule::new(
                self.mask_text_class.compile()?,
                self.mask_text_selector.clone(),
            ),
            inline_stylesheet: self.inline_stylesheet,
            mask_input_options: self.mask_all_inputs.resolve(),
            slim_dom: self.slim_dom.resolve()?,
            data_url_options: self.data_url_options.clone(),
            inline_images: self.inline_images,
            record_canvas: self.record_canvas,
            preserve_white_space: self.preserve_white_space,
            strict_privacy: self.enable_strict_privacy,
            iframe_load_timeout: Duration::from_millis(self.iframe_load_timeout_ms),
            stylesheet_load_timeout: Duration::from_millis(self.stylesheet_load_timeout_ms),
            mask_text_fn: None,
            mask_input_fn: None,
            keep_iframe_src_fn: Arc::new(|_| false),
        })
    }
}

/// Resolved options for one serialization pass
#[derive(Clone)]
pub struct SnapshotOptions {
    pub block: PrivacyRule,
    pub mask_text: PrivacyRule,
    pub inline_stylesheet: bool,
    pub mask_input_options: MaskInputOptions,
    pub slim_dom: SlimDomOptions,
    pub data_url_options: DataUrlOptions,
    pub inline_images: bool,
    pub record_canvas: bool,
    pub preserve_white_space: bool,
    pub strict_privacy: bool,
    pub iframe_load_timeout: Duration,
    pub stylesheet_load_timeout: Duration,
    pub mask_text_fn: Option<MaskTextFn>,
    pub mask_input_fn: Option<MaskInputFn>,
    pub keep_iframe_src_fn: KeepIframeSrcFn,
}

impl SnapshotOptions {
    pub fn with_mask_text_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.mask_text_fn = Some(Arc::new(f));
        self
    }

    pub fn with_mask_input_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.mask_input_fn = Some(Arc::new(f));
        self
    }

    pub fn with_keep_iframe_src_fn(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.keep_iframe_src_fn = Arc::new(f);
        self
    }
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        // Default class names are literals, nothing to compile
        SnapshotOptions {
            block: PrivacyRule::new(ClassMatcher::Name("rr-block".to_string()), None),
            mask_text: PrivacyRule::new(ClassMatcher::Name("rr-mask".to_string()), None),
            inline_stylesheet: true,
            mask_input_options: MaskInputOptions::password_only(),
            slim_dom: SlimDomOptions::default(),
            data_url_options: DataUrlOptions::default(),
            inline_images: false,
            record_canvas: false,
            preserve_white_space: true,
            strict_privacy: false,
            iframe_load_timeout: Duration::from_millis(5000),
            stylesheet_load_timeout: Duration::from_millis(5000),
            mask_text_fn: None,
            mask_input_fn: None,
            keep_iframe_src_fn: Arc::new(|_| false),
        }
    }
}

impl fmt::Debug for SnapshotOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotOptions")
            .field("block", &self.block)
            .field("mask_text", &self.mask_text)
            .field("inline_stylesheet", &self.inline_stylesheet)
            .field("mask_input_options", &self.mask_input_options)
            .field("slim_dom", &self.slim_dom)
            .field("inline_images", &self.inline_images)
            .field("record_canvas", &self.record_canvas)
            .field("preserve_white_space", &self.preserve_white_space)
            .field("strict_privacy", &self.strict_privacy)
            .field("mask_text_fn", &self.mask_text_fn.is_some())
            .field("mask_input_fn", &self.mask_input_fn.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SnapshotConfig::default().resolve().unwrap();
        assert!(options.inline_stylesheet);
        assert!(options.preserve_white_space);
        assert!(!options.strict_privacy);
        assert!(options.mask_input_options.password);
        assert!(!options.mask_input_options.text);
        assert_eq!(options.slim_dom, SlimDomOptions::default());
        assert_eq!(options.iframe_load_timeout, Duration::from_secs(5));
        assert!(!(options.keep_iframe_src_fn)("https://example.com"));
    }

    #[test]
    fn test_shorthands_from_json() {
        let config = SnapshotConfig::from_json(
            r#"{"maskAllInputs": true, "slimDOM": "all", "blockClass": {"pattern": "^private-"}}"#,
        )
        .unwrap();
        let options = config.resolve().unwrap();
        assert_eq!(options.mask_input_options, MaskInputOptions::all());
        assert!(options.slim_dom.head_meta_desc_keywords);
        assert!(matches!(options.block.class, ClassMatcher::Pattern(_)));
        assert_eq!(options.mask_text.selector, None);
    }

    #[test]
    fn test_slim_dom_true_skips_desc_keywords() {
        let config = SnapshotConfig::from_json(r#"{"slimDOM": true}"#).unwrap();
        let slim = config.resolve().unwrap().slim_dom;
        assert!(slim.script && slim.comment && slim.head_whitespace);
        assert!(!slim.head_meta_desc_keywords);
    }

    #[test]
    fn test_explicit_maps() {
        let config = SnapshotConfig::from_json(
            r#"{"maskAllInputs": {"email": true}, "slimDOM": {"comment": true}, "dataURLOptions": {"type": "image/jpeg", "quality": 0.5}}"#,
        )
        .unwrap();
        let options = config.resolve().unwrap();
        assert!(options.mask_input_options.is_enabled("email"));
        assert!(!options.mask_input_options.is_enabled("password"));
        assert!(options.slim_dom.comment && !options.slim_dom.script);
        assert_eq!(options.data_url_options.mime_type, "image/jpeg");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let bad_preset = SnapshotConfig::from_json(r#"{"slimDOM": "some"}"#).unwrap();
        assert!(matches!(
            bad_preset.resolve(),
            Err(SnapshotError::InvalidOption { .. })
        ));

        let bad_regex = SnapshotConfig::from_json(r#"{"maskTextClass": {"pattern": "("}}"#).unwrap();
        assert!(matches!(bad_regex.resolve(), Err(SnapshotError::InvalidRegex(_))));

        assert!(matches!(
            SnapshotConfig::from_json("{"),
            Err(SnapshotError::Config(_))
        ));
    }
}
