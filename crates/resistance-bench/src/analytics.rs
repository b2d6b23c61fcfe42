use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use resistance_core::{GameOutcome, Hypothesis};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

const CONFIDENCE_Z: f64 = 1.96; // 95% CI

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("hypothesis {0} is not tracked by this collector")]
    UnknownHypothesis(String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("statistics error: {0}")]
    Stats(String),
}

/// Tallies simulated games per ground-truth hypothesis.
pub struct SimulationCollector {
    tallies: Vec<HypothesisTally>,
}

#[derive(Clone)]
struct HypothesisTally {
    hypothesis: Hypothesis,
    games: usize,
    resistance_wins: usize,
}

impl SimulationCollector {
    pub fn new(hypotheses: &[Hypothesis]) -> Self {
        Self {
            tallies: hypotheses
                .iter()
                .map(|&hypothesis| HypothesisTally {
                    hypothesis,
                    games: 0,
                    resistance_wins: 0,
                })
                .collect(),
        }
    }

    pub fn record(
        &mut self,
        truth: Hypothesis,
        outcome: GameOutcome,
    ) -> Result<(), AnalyticsError> {
        let tally = self
            .tallies
            .iter_mut()
            .find(|tally| tally.hypothesis == truth)
            .ok_or_else(|| AnalyticsError::UnknownHypothesis(truth.to_string()))?;
        tally.games += 1;
        if !outcome.spies_win() {
            tally.resistance_wins += 1;
        }
        Ok(())
    }

    /// Summarizes the tallies and tests the pooled rate against `exact`.
    pub fn finalize(self, exact: f64) -> Result<SimulationSummary, AnalyticsError> {
        let hypotheses: Vec<HypothesisReport> = self
            .tallies
            .iter()
            .map(|tally| HypothesisReport {
                roles: tally.hypothesis.to_string(),
                games: tally.games,
                resistance_wins: tally.resistance_wins,
                win_rate: rate(tally.resistance_wins, tally.games),
                ci95: proportion_interval(tally.resistance_wins, tally.games),
            })
            .collect();

        let games: usize = hypotheses.iter().map(|h| h.games).sum();
        let resistance_wins: usize = hypotheses.iter().map(|h| h.resistance_wins).sum();
        let win_rate = rate(resistance_wins, games);
        let (z_score, p_value) = z_test(win_rate, exact, games)?;

        Ok(SimulationSummary {
            hypotheses,
            games,
            resistance_wins,
            win_rate,
            ci95: proportion_interval(resistance_wins, games),
            exact,
            z_score,
            p_value,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HypothesisReport {
    pub roles: String,
    pub games: usize,
    pub resistance_wins: usize,
    pub win_rate: f64,
    pub ci95: (f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub hypotheses: Vec<HypothesisReport>,
    pub games: usize,
    pub resistance_wins: usize,
    pub win_rate: f64,
    pub ci95: (f64, f64),
    /// Exact optimal win chance from the opening position.
    pub exact: f64,
    /// `None` when the exact chance is 0 or 1 and the observed rate disagrees.
    pub z_score: Option<f64>,
    pub p_value: f64,
}

impl SimulationSummary {
    pub fn exact_within_ci(&self) -> bool {
        self.ci95.0 <= self.exact && self.exact <= self.ci95.1
    }
}

fn rate(wins: usize, games: usize) -> f64 {
    if games == 0 {
        0.0
    } else {
        wins as f64 / games as f64
    }
}

/// Normal-approximation interval for a Bernoulli proportion, clamped to [0, 1].
fn proportion_interval(wins: usize, games: usize) -> (f64, f64) {
    if games == 0 {
        return (0.0, 0.0);
    }
    let p = rate(wins, games);
    let std_error = (p * (1.0 - p) / games as f64).sqrt();
    let margin = CONFIDENCE_Z * std_error;
    ((p - margin).max(0.0), (p + margin).min(1.0))
}

/// Two-sided one-sample z-test of an observed proportion against `expected`.
fn z_test(
    observed: f64,
    expected: f64,
    games: usize,
) -> Result<(Option<f64>, f64), AnalyticsError> {
    if games == 0 {
        return Ok((None, 1.0));
    }
    let std_error = (expected * (1.0 - expected) / games as f64).sqrt();
    if std_error <= 0.0 {
        return Ok(if (observed - expected).abs() < 1e-12 {
            (Some(0.0), 1.0)
        } else {
            (None, 0.0)
        });
    }
    let z = (observed - expected) / std_error;
    let normal = Normal::new(0.0, 1.0).map_err(|e| AnalyticsError::Stats(e.to_string()))?;
    let p = 2.0 * (1.0 - normal.cdf(z.abs()));
    Ok((Some(z), p.clamp(0.0, 1.0)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub fail_probability: f64,
    pub win_chance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub points: Vec<SweepPoint>,
}

impl SweepSummary {
    pub fn new(points: Vec<SweepPoint>) -> Self {
        Self { points }
    }

    /// The first grid point with the lowest resistance win chance.
    pub fn spy_optimum(&self) -> Option<SweepPoint> {
        let mut best: Option<SweepPoint> = None;
        for &point in &self.points {
            match best {
                Some(top) if point.win_chance >= top.win_chance => {}
                _ => best = Some(point),
            }
        }
        best
    }

    pub fn render_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
                context: "creating plots directory",
                source: e,
            })?;
        }

        let output_path = dir.join("sweep.png");
        let points: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|p| (p.fail_probability, p.win_chance))
            .collect();
        let optimum = self.spy_optimum();

        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let plot_attempt = std::panic::catch_unwind(move || {
            let root = BitMapBackend::new(&output_path, (800, 480)).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            let y_min = points.iter().map(|p| p.1).fold(1.0f64, f64::min);
            let y_max = points.iter().map(|p| p.1).fold(0.0f64, f64::max);
            let margin = ((y_max - y_min).abs() * 0.1).max(0.02);

            let mut chart = ChartBuilder::on(&root)
                .margin(20)
                .caption(
                    "Resistance win chance vs spy fail probability",
                    ("sans-serif", 22),
                )
                .set_label_area_size(LabelAreaPosition::Left, 50)
                .set_label_area_size(LabelAreaPosition::Bottom, 40)
                .build_cartesian_2d(0.0f64..1.0f64, (y_min - margin)..(y_max + margin))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .configure_mesh()
                .x_desc("Fail probability")
                .y_desc("Win chance")
                .draw()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(std::iter::once(PathElement::new(
                    points.clone(),
                    BLUE.stroke_width(2),
                )))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(points.iter().map(|&(x, y)| {
                    let is_optimum = optimum.is_some_and(|o| o.fail_probability == x);
                    let color = if is_optimum { &RED } else { &BLUE };
                    Circle::new((x, y), 4, color.filled())
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(chart);

            root.present()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(root);

            Ok(output_path)
        });

        std::panic::set_hook(prev_hook);

        match plot_attempt {
            Ok(result) => result,
            Err(_) => Err(AnalyticsError::Plot(
                "plotters panicked while rendering (missing font support?)".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resistance_core::GameConfig;

    fn collector() -> (SimulationCollector, Vec<Hypothesis>) {
        let config = GameConfig::seven_player();
        let hypotheses = config.hypothesis_space().as_slice().to_vec();
        (SimulationCollector::new(&hypotheses), hypotheses)
    }

    #[test]
    fn pools_per_hypothesis_tallies() {
        let (mut collector, hypotheses) = collector();
        collector
            .record(hypotheses[0], GameOutcome::ResistanceWin)
            .expect("record");
        collector
            .record(hypotheses[0], GameOutcome::SpyWin)
            .expect("record");
        collector
            .record(hypotheses[1], GameOutcome::ResistanceWin)
            .expect("record");

        let summary = collector.finalize(0.5).expect("finalize");
        assert_eq!(summary.games, 3);
        assert_eq!(summary.resistance_wins, 2);
        assert_eq!(summary.hypotheses.len(), 35);
        assert_eq!(summary.hypotheses[0].games, 2);
        assert!((summary.hypotheses[0].win_rate - 0.5).abs() < 1e-12);
        assert_eq!(summary.hypotheses[2].games, 0);
        assert_eq!(summary.hypotheses[2].ci95, (0.0, 0.0));
    }

    #[test]
    fn rejects_foreign_hypothesis() {
        let (mut collector, _) = collector();
        let stranger = Hypothesis::from_mask(0b1, 7);
        assert!(matches!(
            collector.record(stranger, GameOutcome::SpyWin),
            Err(AnalyticsError::UnknownHypothesis(_))
        ));
    }

    #[test]
    fn z_test_matches_exact_rate() {
        let (mut collector, hypotheses) = collector();
        for (idx, &hypothesis) in hypotheses.iter().enumerate() {
            let outcome = if idx % 2 == 0 {
                GameOutcome::ResistanceWin
            } else {
                GameOutcome::SpyWin
            };
            collector.record(hypothesis, outcome).expect("record");
        }
        let summary = collector.finalize(18.0 / 35.0).expect("finalize");
        assert_eq!(summary.resistance_wins, 18);
        let z = summary.z_score.expect("finite z");
        assert!(z.abs() < 1e-9);
        assert!((summary.p_value - 1.0).abs() < 1e-9);
        assert!(summary.exact_within_ci());
    }

    #[test]
    fn certain_exact_rate_flags_disagreement() {
        let (mut collector, hypotheses) = collector();
        collector
            .record(hypotheses[3], GameOutcome::SpyWin)
            .expect("record");
        let summary = collector.finalize(1.0).expect("finalize");
        assert_eq!(summary.z_score, None);
        assert_eq!(summary.p_value, 0.0);
    }

    #[test]
    fn spy_optimum_takes_first_minimum() {
        let sweep = SweepSummary::new(vec![
            SweepPoint {
                fail_probability: 0.1,
                win_chance: 0.4,
            },
            SweepPoint {
                fail_probability: 0.2,
                win_chance: 0.3,
            },
            SweepPoint {
                fail_probability: 0.3,
                win_chance: 0.3,
            },
        ]);
        let optimum = sweep.spy_optimum().expect("non-empty sweep");
        assert_eq!(optimum.fail_probability, 0.2);
        assert!(SweepSummary::new(Vec::new()).spy_optimum().is_none());
    }
}
