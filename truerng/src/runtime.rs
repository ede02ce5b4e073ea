use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    cache::SupplyCache,
    credential::{CredentialStore, reconcile_credential},
    pipeline::DrawPipeline,
    settings::{SettingChange, Settings, SettingsError},
    source::{ApiKey, RandomSource, random_org::RandomOrgSource},
    toggle::QuickToggle,
};

/// Builds a source for a credential. `None` leaves the cache unbound.
pub type SourceFactory = Box<dyn FnMut(&ApiKey) -> Option<Box<dyn RandomSource>> + Send>;

pub fn random_org_factory() -> SourceFactory {
    Box::new(|key: &ApiKey| match RandomOrgSource::new(key.clone()) {
        Ok(source) => Some(Box::new(source) as Box<dyn RandomSource>),
        Err(e) => {
            log::error!("Could not create random.org client: {e}");
            None
        }
    })
}

pub struct TrueRng {
    cache: SupplyCache,
    pipeline: DrawPipeline,
    toggle: QuickToggle,
    settings: Settings,
    settings_path: Option<PathBuf>,
    make_source: SourceFactory,
}

impl std::fmt::Debug for TrueRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrueRng")
            .field("cache", &self.cache)
            .field("pipeline", &self.pipeline)
            .field("toggle", &self.toggle)
            .field("settings", &self.settings)
            .field("settings_path", &self.settings_path)
            .finish()
    }
}

impl TrueRng {
    pub fn new(cache: SupplyCache, make_source: SourceFactory) -> Self {
        let settings = Settings::default();
        Self {
            cache,
            pipeline: DrawPipeline::new(),
            toggle: QuickToggle::new(settings.enabled, settings.show_toggle),
            settings,
            settings_path: None,
            make_source,
        }
    }

    /// Writes settings back to `path` whenever they change.
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    fn persist(&self) -> Result<(), SettingsError> {
        if let Some(path) = &self.settings_path {
            self.settings.save(path)?;
            log::debug!("Settings saved to {}", path.display());
        }
        Ok(())
    }

    /// Applies `settings`, reconciles the API key with the local store and binds
    /// the source, which immediately requests the first batch.
    pub fn start(
        &mut self,
        settings: Settings,
        store: &mut dyn CredentialStore,
    ) -> anyhow::Result<()> {
        log::debug!("TrueRNG initializing...");
        settings.validate()?;
        self.settings = settings;

        self.cache
            .configure(self.settings.max_cached as usize, self.settings.refill_threshold());
        self.cache.set_enabled(self.settings.enabled);
        self.cache.set_show_seeds(self.settings.show_seeds);
        self.toggle = QuickToggle::new(self.settings.enabled, self.settings.show_toggle);

        let configured = self.settings.api_key.clone();
        match reconcile_credential(&mut self.settings, store)? {
            Some(key) => self.bind_key(&key),
            None => log::debug!("No API key configured"),
        }
        if self.settings.api_key != configured {
            self.persist()?;
        }
        Ok(())
    }

    fn bind_key(&mut self, key: &ApiKey) {
        let source = if key.is_usable() {
            (self.make_source)(key)
        } else {
            None
        };
        self.cache.bind(source);
    }

    pub fn apply(&mut self, change: SettingChange) -> Result<(), SettingsError> {
        self.settings.apply(&change)?;
        match change {
            SettingChange::ApiKey(key) => {
                log::debug!("New API key: {key:?}");
                self.bind_key(&key);
            }
            SettingChange::MaxCached(_) | SettingChange::UpdatePoint(_) => {
                self.cache
                    .configure(self.settings.max_cached as usize, self.settings.refill_threshold());
            }
            SettingChange::Enabled(enabled) => self.set_enabled(enabled),
            SettingChange::Debug(debug) => {
                log::debug!("Debug mode: {debug}");
                log::set_max_level(if debug {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                });
            }
            SettingChange::ShowToggle(show) => self.toggle.set_visible(show),
            SettingChange::ShowSeeds(show) => self.cache.set_show_seeds(show),
        }
        self.persist()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        self.cache.set_enabled(enabled);
        self.toggle.set_enabled(enabled);
    }

    /// A click on the quick toggle. Returns the new enabled state.
    pub fn click_toggle(&mut self) -> bool {
        let enabled = self.toggle.click();
        self.set_enabled(enabled);
        enabled
    }

    /// The host's uniform generator replacement. Never fails.
    pub fn random_uniform(&mut self) -> f64 {
        self.pipeline.draw(&mut self.cache)
    }

    pub fn prewarm(&mut self, timeout: Duration) -> bool {
        self.cache.wait_for_refill(timeout)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.pipeline.last_value()
    }

    pub fn cache(&self) -> &SupplyCache {
        &self.cache
    }

    pub fn pipeline_mut(&mut self) -> &mut DrawPipeline {
        &mut self.pipeline
    }

    pub fn quick_toggle(&self) -> &QuickToggle {
        &self.toggle
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }
}
