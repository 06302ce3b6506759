//! Map view lifecycle: one session owns the rendering sink and the dataset
//! currently on display.

use std::time::Duration;

use crate::config::MapConfig;
use crate::error::LoadError;
use crate::output::MapData;
use crate::pipeline::{self, ProgressCallback};
use crate::source::{load_source, SourceLocation};

/// The rendering collaborator. Receives either a complete dataset or a
/// single terminal error message per load cycle, never a partial map.
pub trait RenderSink {
    /// Show a fully assembled dataset, replacing whatever was shown before.
    fn present(&mut self, data: &MapData) -> Result<(), LoadError>;

    /// Show the user-facing message for a failed load.
    fn show_error(&mut self, error: &LoadError);

    /// Remove any dataset currently shown.
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    TornDown,
}

pub struct MapSession<R: RenderSink> {
    config: MapConfig,
    sink: R,
    state: SessionState,
    current: Option<MapData>,
    last_source: Option<SourceLocation>,
    progress: Option<ProgressCallback>,
}

impl<R: RenderSink> MapSession<R> {
    pub fn new(config: MapConfig, sink: R) -> Self {
        Self {
            config,
            sink,
            state: SessionState::Active,
            current: None,
            last_source: None,
            progress: None,
        }
    }

    /// Report `(phase, label)` progress for every subsequent load.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Dataset currently presented, if the last load succeeded.
    pub fn current(&self) -> Option<&MapData> {
        self.current.as_ref()
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    /// Fetch and transform `source`, then present it. Each call is a fresh
    /// load cycle over fresh collections.
    pub fn load(&mut self, source: &SourceLocation) -> Result<&MapData, LoadError> {
        if self.state == SessionState::TornDown {
            return Err(LoadError::SessionInactive);
        }
        self.last_source = Some(source.clone());

        log::info!("Loading {source}");
        if let Some(cb) = self.progress.as_mut() {
            cb("source", "Loading data source");
        }
        let timeout = Duration::from_secs(self.config.fetch_timeout_secs);
        let outcome = load_source(source, timeout).and_then(|text| {
            let config = MapConfig {
                source: source.to_string(),
                ..self.config.clone()
            };
            pipeline::run_pipeline(&text, &config, self.progress.as_mut())
        });
        self.finish(outcome)
    }

    /// Transform an in-memory payload and present it.
    pub fn load_text(&mut self, text: &str) -> Result<&MapData, LoadError> {
        if self.state == SessionState::TornDown {
            return Err(LoadError::SessionInactive);
        }
        let outcome = pipeline::run_pipeline(text, &self.config, self.progress.as_mut());
        self.finish(outcome)
    }

    /// Re-run the last `load` source from scratch.
    pub fn reload(&mut self) -> Result<&MapData, LoadError> {
        match self.last_source.clone() {
            Some(source) => self.load(&source),
            None => Err(LoadError::SessionInactive),
        }
    }

    /// Clear the view and release the current dataset. Loads are refused
    /// until `reinitialize`.
    pub fn teardown(&mut self) {
        self.sink.clear();
        self.current = None;
        self.last_source = None;
        self.state = SessionState::TornDown;
    }

    pub fn reinitialize(&mut self) {
        if self.state == SessionState::Active {
            self.sink.clear();
        }
        self.current = None;
        self.state = SessionState::Active;
    }

    fn finish(&mut self, outcome: Result<MapData, LoadError>) -> Result<&MapData, LoadError> {
        let presented = outcome.and_then(|data| {
            self.sink.present(&data)?;
            Ok(data)
        });

        match presented {
            Ok(data) => Ok(&*self.current.insert(data)),
            Err(error) => {
                log::error!("Load failed: {error}");
                self.current = None;
                self.sink.clear();
                self.sink.show_error(&error);
                Err(error)
            }
        }
    }
}
