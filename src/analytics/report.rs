/// Distribution and correlation analysis over a written score table

use std::fmt;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

pub const HISTOGRAM_BINS: usize = 20;
pub const EXTREMES: usize = 5;

/// A CSV table with a `wallet` and `score` column plus any numeric extras
#[derive(Debug, Clone)]
pub struct ScoreTable {
    pub wallets: Vec<String>,
    pub scores: Vec<f64>,
    /// Other numeric columns, aligned with `scores`
    pub columns: Vec<(String, Vec<f64>)>,
}

impl ScoreTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open score table {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("failed to read score table {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();

        let wallet_idx = headers.iter().position(|h| h == "wallet" || h == "account.id");
        let score_idx = match headers.iter().position(|h| h == "score") {
            Some(idx) => idx,
            None => bail!("score table has no `score` column"),
        };

        let mut wallets = Vec::new();
        let mut scores = Vec::new();
        let mut raw_columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let score = match record.get(score_idx).and_then(|s| s.trim().parse::<f64>().ok()) {
                Some(score) if score.is_finite() => score,
                _ => {
                    warn!("Skipping row {} with unparsable score", row + 1);
                    continue;
                }
            };

            scores.push(score);
            wallets.push(
                wallet_idx
                    .and_then(|idx| record.get(idx))
                    .unwrap_or_default()
                    .to_string(),
            );
            for (idx, column) in raw_columns.iter_mut().enumerate() {
                column.push(record.get(idx).and_then(|v| v.trim().parse::<f64>().ok()).filter(|v| v.is_finite()));
            }
        }

        // Keep only columns that are numeric on every kept row
        let columns = headers
            .iter()
            .zip(raw_columns)
            .enumerate()
            .filter(|(idx, _)| *idx != score_idx && Some(*idx) != wallet_idx)
            .filter_map(|(_, (name, values))| {
                values
                    .into_iter()
                    .collect::<Option<Vec<f64>>>()
                    .map(|values| (name.to_string(), values))
            })
            .collect();

        Ok(Self { wallets, scores, columns })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Boxplot whiskers at 1.5 × IQR and the wallets beyond them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outliers {
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub wallets: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub summary: Summary,
    pub histogram: Vec<HistogramBin>,
    pub outliers: Outliers,
    pub top: Vec<(String, f64)>,
    pub bottom: Vec<(String, f64)>,
    /// Pearson correlation of score with each numeric column; None when undefined
    pub correlations: Vec<(String, Option<f64>)>,
}

impl ScoreReport {
    /// Analyze `scores`. Correlations use the numeric columns of `features`
    /// when given (a feature dump carries its own score column), otherwise the
    /// score table's own extra columns.
    pub fn build(scores: &ScoreTable, features: Option<&ScoreTable>) -> Result<Self> {
        if scores.is_empty() {
            bail!("score table is empty");
        }

        let mut sorted = scores.scores.clone();
        sorted.sort_by(f64::total_cmp);

        let summary = summarize(&scores.scores, &sorted);
        let histogram = histogram(&sorted, HISTOGRAM_BINS);

        let iqr = summary.q3 - summary.q1;
        let lower_fence = summary.q1 - 1.5 * iqr;
        let upper_fence = summary.q3 + 1.5 * iqr;
        let outliers = Outliers {
            lower_fence,
            upper_fence,
            wallets: scores
                .wallets
                .iter()
                .zip(&scores.scores)
                .filter(|(_, s)| **s < lower_fence || **s > upper_fence)
                .map(|(w, s)| (w.clone(), *s))
                .collect(),
        };

        let mut ranked: Vec<(String, f64)> = scores.wallets.iter().cloned().zip(scores.scores.iter().copied()).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let top = ranked.iter().take(EXTREMES).cloned().collect();
        let mut bottom: Vec<(String, f64)> = ranked.iter().rev().take(EXTREMES).cloned().collect();
        bottom.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let source = features.unwrap_or(scores);
        debug!("Correlating score against {} columns", source.columns.len());
        let correlations = source
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), pearson(&source.scores, values)))
            .collect();

        Ok(Self {
            summary,
            histogram,
            outliers,
            top,
            bottom,
            correlations,
        })
    }
}

fn summarize(values: &[f64], sorted: &[f64]) -> Summary {
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    Summary {
        count,
        mean,
        std,
        min: sorted[0],
        q1: quantile(sorted, 0.25),
        median: quantile(sorted, 0.5),
        q3: quantile(sorted, 0.75),
        max: sorted[count - 1],
    }
}

/// Linear-interpolated quantile of an ascending, non-empty slice
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Equal-width bins between min and max; the last bin is closed.
pub fn histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    if sorted.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    // Degenerate range: widen so a single value still lands in a bin
    let (min, max) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (max - min) / bins as f64;

    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for value in sorted {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

/// Pearson correlation; None when either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

impl fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "📊 Score summary ({} wallets)", s.count)?;
        writeln!(
            f,
            "   mean {:.2}  std {:.2}  min {:.0}  q1 {:.2}  median {:.2}  q3 {:.2}  max {:.0}",
            s.mean, s.std, s.min, s.q1, s.median, s.q3, s.max
        )?;

        writeln!(f, "\n📈 Distribution")?;
        let peak = self.histogram.iter().map(|b| b.count).max().unwrap_or(0).max(1);
        for bin in &self.histogram {
            let bar = "#".repeat(bin.count * 40 / peak);
            writeln!(f, "   {:>6.1} - {:>6.1} | {:>6} {}", bin.lower, bin.upper, bin.count, bar)?;
        }

        writeln!(
            f,
            "\n🔎 Outliers outside [{:.2}, {:.2}]: {}",
            self.outliers.lower_fence,
            self.outliers.upper_fence,
            self.outliers.wallets.len()
        )?;
        for (wallet, score) in self.outliers.wallets.iter().take(10) {
            writeln!(f, "   {} {:.0}", wallet, score)?;
        }

        writeln!(f, "\n🏆 Top {} wallets", self.top.len())?;
        for (wallet, score) in &self.top {
            writeln!(f, "   {} {:.0}", wallet, score)?;
        }
        writeln!(f, "\n🔻 Bottom {} wallets", self.bottom.len())?;
        for (wallet, score) in &self.bottom {
            writeln!(f, "   {} {:.0}", wallet, score)?;
        }

        if !self.correlations.is_empty() {
            writeln!(f, "\n🔗 Correlation with score")?;
            for (name, value) in &self.correlations {
                match value {
                    Some(r) => writeln!(f, "   {:<30} {:>6.3}", name, r)?,
                    None => writeln!(f, "   {:<30} {:>6}", name, "n/a")?,
                }
            }
        }
        Ok(())
    }
}
