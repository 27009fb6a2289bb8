//! Fusion of detector outputs into one alert decision.

use serde::{Deserialize, Serialize};

/// Which change signals are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    /// Mean of the NDVI and inference percentages; CVA is reported only.
    #[default]
    NdviAndInference,
    /// Mean of NDVI, inference and CVA percentages.
    IncludeSpectral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Ndvi,
    Inference,
    Cva,
}

/// Change percentages produced for one task check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeSignals {
    pub ndvi: f64,
    pub inference: f64,
    pub cva: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedDecision {
    pub combined_change_percentage: f64,
    pub alerted: bool,
    /// Task threshold (fraction) at decision time
    pub threshold: f64,
    pub inputs: Vec<Signal>,
}

/// Average the signals selected by `policy` and compare against
/// `threshold * 100`.
///
/// The alert comparison is strict: a combined change equal to the threshold
/// does not alert. Under `IncludeSpectral` a missing CVA value falls back to
/// the two-signal mean.
pub fn fuse(signals: ChangeSignals, threshold: f64, policy: FusionPolicy) -> FusedDecision {
    let mut inputs = vec![(Signal::Ndvi, signals.ndvi), (Signal::Inference, signals.inference)];
    if let (FusionPolicy::IncludeSpectral, Some(cva)) = (policy, signals.cva) {
        inputs.push((Signal::Cva, cva));
    }

    let combined = inputs.iter().map(|(_, v)| v).sum::<f64>() / inputs.len() as f64;
    FusedDecision {
        combined_change_percentage: combined,
        alerted: combined > threshold * 100.0,
        threshold,
        inputs: inputs.into_iter().map(|(s, _)| s).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_excludes_cva() {
        let signals = ChangeSignals {
            ndvi: 20.0,
            inference: 40.0,
            cva: Some(90.0),
        };
        let d = fuse(signals, 0.25, FusionPolicy::default());
        assert_relative_eq!(d.combined_change_percentage, 30.0);
        assert!(d.alerted);
        assert_eq!(d.threshold, 0.25);
        assert_eq!(d.inputs, vec![Signal::Ndvi, Signal::Inference]);
    }

    #[test]
    fn test_include_spectral() {
        let signals = ChangeSignals {
            ndvi: 10.0,
            inference: 20.0,
            cva: Some(60.0),
        };
        let d = fuse(signals, 0.35, FusionPolicy::IncludeSpectral);
        assert_relative_eq!(d.combined_change_percentage, 30.0);
        assert!(!d.alerted);
        assert_eq!(d.inputs.len(), 3);

        let no_cva = ChangeSignals { cva: None, ..signals };
        assert_relative_eq!(
            fuse(no_cva, 0.35, FusionPolicy::IncludeSpectral).combined_change_percentage,
            15.0
        );
    }

    #[test]
    fn test_equal_to_threshold_does_not_alert() {
        let signals = ChangeSignals {
            ndvi: 50.0,
            inference: 50.0,
            cva: None,
        };
        assert!(!fuse(signals, 0.5, FusionPolicy::default()).alerted);
    }
}
