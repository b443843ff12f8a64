//! # OCR Instance Manager Module
//!
//! Pools Tesseract engines so repeated uploads skip engine initialization and
//! concurrent pipeline workers never share one engine.

use std::collections::HashMap;

use leptess::LepTess;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;

/// Default number of idle engines kept per configuration
pub const DEFAULT_MAX_IDLE_PER_KEY: usize = 4;

/// Thread-safe pool of Tesseract instances keyed by language and layout settings
///
/// An engine is checked out for the duration of one recognition and returned
/// afterwards. Engines whose recognition failed are dropped instead of being
/// returned, so a broken engine is never handed out twice.
///
/// # Instance Lifecycle
///
/// - Instances are created on demand when no idle engine exists for a key
/// - At most `max_idle_per_key` idle engines are retained per key
/// - Instances live until the manager is dropped
pub struct OcrInstanceManager {
    idle: Mutex<HashMap<String, Vec<LepTess>>>,
    max_idle_per_key: usize,
}

impl OcrInstanceManager {
    /// Create an empty pool
    ///
    /// # Examples
    ///
    /// ```rust
    /// use candidate_intake::instance_manager::OcrInstanceManager;
    ///
    /// let manager = OcrInstanceManager::new();
    /// assert_eq!(manager.idle_count(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE_PER_KEY)
    }

    pub fn with_max_idle(max_idle_per_key: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_key: max_idle_per_key.max(1),
        }
    }

    /// Run `f` with an engine configured for `config`.
    ///
    /// This blocks while Tesseract works; call it from a blocking thread.
    pub fn with_instance<T>(
        &self,
        config: &OcrConfig,
        f: impl FnOnce(&mut LepTess) -> Result<T, OcrError>,
    ) -> Result<T, OcrError> {
        let key = Self::instance_key(config);

        let pooled = self.idle.lock().get_mut(&key).and_then(Vec::pop);
        let mut tess = match pooled {
            Some(tess) => {
                debug!(key = %key, "Reusing pooled OCR instance");
                tess
            }
            None => Self::create_instance(config)?,
        };

        let result = f(&mut tess);

        if result.is_ok() {
            let mut idle = self.idle.lock();
            let slot = idle.entry(key).or_default();
            if slot.len() < self.max_idle_per_key {
                slot.push(tess);
            }
        }

        result
    }

    /// Number of idle engines across all keys
    pub fn idle_count(&self) -> usize {
        self.idle.lock().values().map(Vec::len).sum()
    }

    /// Drop all idle engines
    pub fn clear(&self) {
        let mut idle = self.idle.lock();
        let removed: usize = idle.values().map(Vec::len).sum();
        idle.clear();
        info!("Cleared {} pooled OCR instances", removed);
    }

    fn instance_key(config: &OcrConfig) -> String {
        format!(
            "{}:{}:{}",
            config.languages,
            config.psm_mode.as_str(),
            config.tessdata_dir.as_deref().unwrap_or("default")
        )
    }

    fn create_instance(config: &OcrConfig) -> Result<LepTess, OcrError> {
        info!(
            languages = %config.languages,
            psm = %config.psm_mode.as_str(),
            "Creating new OCR instance"
        );

        let mut tess = LepTess::new(config.tessdata_dir.as_deref(), &config.languages).map_err(|e| {
            OcrError::Initialization(format!("Failed to initialize Tesseract OCR instance: {}", e))
        })?;

        // Forms are laid out as one column of labeled lines
        tess.set_variable(leptess::Variable::TesseditPagesegMode, config.psm_mode.as_str())
            .map_err(|e| OcrError::Initialization(format!("Failed to set PSM mode: {}", e)))?;

        Ok(tess)
    }
}

impl Default for OcrInstanceManager {
    fn default() -> Self {
        Self::new()
    }
}
