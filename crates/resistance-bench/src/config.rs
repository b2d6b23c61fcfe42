use resistance_core::behavior::BehaviorEntry;
use resistance_core::{BehaviorModel, GameConfig, MissionSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_PLAYERS: usize = 7;
const DEFAULT_SPIES: usize = 3;
const DEFAULT_WINS_NEEDED: usize = 3;
const DEFAULT_GAMES_PER_HYPOTHESIS: usize = 100;
const MAX_SWEEP_POINTS: usize = 10_000;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root analysis configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    #[serde(default)]
    pub game: GameSection,
    pub models: Vec<ModelConfig>,
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub sweep: Option<SweepConfig>,
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchmarkConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        let game = self.game.build()?;
        let models = self.build_models(&game)?;
        self.evaluation.validate(&models)?;
        if let Some(sweep) = self.sweep.as_ref() {
            sweep.validate()?;
        }
        if let Some(simulation) = self.simulation.as_ref() {
            simulation.validate(&models)?;
        }
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            plots_dir: resolve_template(&self.run_id, &self.outputs.plots_dir),
        }
    }

    /// Builds every named behaviour model, checking each covers the game's reachable states.
    pub fn build_models(
        &self,
        game: &GameConfig,
    ) -> Result<BTreeMap<String, BehaviorModel>, ValidationError> {
        if self.models.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "models".to_string(),
                message: "at least one model must be specified".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut built = BTreeMap::new();
        for model in &self.models {
            if model.name.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: "models.name".to_string(),
                    message: "model name must not be empty".to_string(),
                });
            }
            if !model.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
                return Err(ValidationError::InvalidField {
                    field: format!("models[{}].name", model.name),
                    message: "model name contains invalid characters".to_string(),
                });
            }
            if !seen.insert(model.name.clone()) {
                return Err(ValidationError::InvalidField {
                    field: "models".to_string(),
                    message: format!("model name '{}' defined more than once", model.name),
                });
            }
            built.insert(model.name.clone(), model.build(game)?);
        }
        Ok(built)
    }
}

/// Table size and mission layout.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GameSection {
    #[serde(default = "default_players")]
    pub players: usize,
    #[serde(default = "default_spies")]
    pub spies: usize,
    #[serde(default = "default_wins_needed")]
    pub wins_needed: usize,
    /// Custom mission table; the standard seven-seat table is used when absent.
    #[serde(default)]
    pub missions: Option<Vec<MissionSpec>>,
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            players: DEFAULT_PLAYERS,
            spies: DEFAULT_SPIES,
            wins_needed: DEFAULT_WINS_NEEDED,
            missions: None,
        }
    }
}

impl GameSection {
    pub fn build(&self) -> Result<GameConfig, ValidationError> {
        let missions = match self.missions.as_ref() {
            Some(missions) => missions.clone(),
            None if self.players == DEFAULT_PLAYERS => {
                GameConfig::seven_player().missions().to_vec()
            }
            None => {
                return Err(ValidationError::InvalidField {
                    field: "game.missions".to_string(),
                    message: format!(
                        "a mission table is required for {} players",
                        self.players
                    ),
                });
            }
        };
        GameConfig::new(self.players, self.spies, self.wins_needed, missions).map_err(|err| {
            ValidationError::InvalidField {
                field: "game".to_string(),
                message: err.to_string(),
            }
        })
    }
}

fn default_players() -> usize {
    DEFAULT_PLAYERS
}

fn default_spies() -> usize {
    DEFAULT_SPIES
}

fn default_wins_needed() -> usize {
    DEFAULT_WINS_NEEDED
}

/// A named spy behaviour model.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub kind: ModelKind,
    #[serde(default)]
    pub fail_probability: Option<f64>,
    #[serde(default)]
    pub entries: Vec<BehaviorEntry>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Hand-tuned seven-player table.
    Tuned,
    /// Every reachable state shares one fail probability.
    Constant,
    /// Explicit entries.
    Table,
}

impl ModelConfig {
    pub fn build(&self, game: &GameConfig) -> Result<BehaviorModel, ValidationError> {
        let field = format!("models[{}]", self.name);
        let invalid = |message: String| ValidationError::InvalidField {
            field: field.clone(),
            message,
        };

        let model = match self.kind {
            ModelKind::Tuned => BehaviorModel::tuned(),
            ModelKind::Constant => {
                let p = self
                    .fail_probability
                    .ok_or_else(|| invalid("constant model needs fail_probability".to_string()))?;
                BehaviorModel::constant(game, p).map_err(|err| invalid(err.to_string()))?
            }
            ModelKind::Table => {
                if self.entries.is_empty() {
                    return Err(invalid("table model needs at least one entry".to_string()));
                }
                BehaviorModel::try_from(self.entries.clone())
                    .map_err(|err| invalid(err.to_string()))?
            }
        };

        model
            .validate_for(game)
            .map_err(|err| invalid(err.to_string()))?;
        Ok(model)
    }
}

/// Which models drive the exact win-chance computations.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EvaluationConfig {
    /// Model the resistance plans with.
    pub belief_model: String,
    /// Model spies actually follow; enables the mismatch evaluation.
    #[serde(default)]
    pub real_model: Option<String>,
}

impl EvaluationConfig {
    fn validate(&self, models: &BTreeMap<String, BehaviorModel>) -> Result<(), ValidationError> {
        require_model(models, "evaluation.belief_model", &self.belief_model)?;
        if let Some(real) = self.real_model.as_ref() {
            require_model(models, "evaluation.real_model", real)?;
        }
        Ok(())
    }
}

/// Grid of constant fail probabilities to scan.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_start")]
    pub start: f64,
    #[serde(default = "default_sweep_stop")]
    pub stop: f64,
    #[serde(default = "default_sweep_step")]
    pub step: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start: default_sweep_start(),
            stop: default_sweep_stop(),
            step: default_sweep_step(),
        }
    }
}

impl SweepConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.start) || !in_range(self.stop) || self.start > self.stop {
            return Err(ValidationError::InvalidField {
                field: "sweep".to_string(),
                message: "start and stop must satisfy 0 <= start <= stop <= 1".to_string(),
            });
        }
        if !(self.step > 0.0) {
            return Err(ValidationError::InvalidField {
                field: "sweep.step".to_string(),
                message: "step must be greater than zero".to_string(),
            });
        }
        let points = self.intervals() + 1.0;
        if points > MAX_SWEEP_POINTS as f64 {
            return Err(ValidationError::InvalidField {
                field: "sweep.step".to_string(),
                message: format!(
                    "step yields {points:.0} grid points; at most {MAX_SWEEP_POINTS} are allowed"
                ),
            });
        }
        Ok(())
    }

    /// Whole steps between `start` and `stop`.
    fn intervals(&self) -> f64 {
        ((self.stop - self.start) / self.step + 1e-9).floor()
    }

    /// Grid points from `start` to `stop` inclusive, computed by index to avoid drift.
    pub fn grid(&self) -> Vec<f64> {
        let steps = self.intervals() as usize;
        (0..=steps)
            .map(|i| (self.start + i as f64 * self.step).min(self.stop))
            .collect()
    }
}

fn default_sweep_start() -> f64 {
    0.1
}

fn default_sweep_stop() -> f64 {
    0.9
}

fn default_sweep_step() -> f64 {
    0.1
}

/// Monte-Carlo playouts against every role assignment.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub model: String,
    #[serde(default = "default_games_per_hypothesis")]
    pub games_per_hypothesis: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    fn validate(&self, models: &BTreeMap<String, BehaviorModel>) -> Result<(), ValidationError> {
        require_model(models, "simulation.model", &self.model)?;
        if self.games_per_hypothesis == 0 {
            return Err(ValidationError::InvalidField {
                field: "simulation.games_per_hypothesis".to_string(),
                message: "games per hypothesis must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_games_per_hypothesis() -> usize {
    DEFAULT_GAMES_PER_HYPOTHESIS
}

fn require_model(
    models: &BTreeMap<String, BehaviorModel>,
    field: &str,
    name: &str,
) -> Result<(), ValidationError> {
    if models.contains_key(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: field.to_string(),
            message: format!("model '{name}' is not defined in models list"),
        })
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    pub plots_dir: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
            ("outputs.plots_dir", &self.plots_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub plots_dir: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
