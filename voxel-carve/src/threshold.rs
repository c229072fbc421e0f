//! Automatic search for the HSV thresholds of background subtraction.
//!
//! The segmentation itself happens elsewhere. The caller segments a frame with
//! [`ThresholdTuner::thresholds`], hands the resulting mask to [`ThresholdTuner::update`]
//! and repeats until the tuner reports [`TuningStage::Converged`]. Each channel is
//! raised while the mask keeps getting closer to a hand-made reference mask, and is
//! backed off a little once it stops improving.

use crate::{ForegroundMask, TunerSettings};
use log::*;

/// Cutoffs of the per-channel absolute difference to the background in HSV space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HsvThresholds {
    pub hue: u8,
    pub saturation: u8,
    pub value: u8,
}

/// The channel the tuner is working on. Stages only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TuningStage {
    TuningHue,
    TuningSaturation,
    TuningValue,
    Converged,
}

impl TuningStage {
    fn next(self) -> Self {
        match self {
            Self::TuningHue => Self::TuningSaturation,
            Self::TuningSaturation => Self::TuningValue,
            Self::TuningValue | Self::Converged => Self::Converged,
        }
    }
}

/// Greedy coordinate search over the hue, saturation and value thresholds.
#[derive(Debug, Clone)]
pub struct ThresholdTuner {
    reference: ForegroundMask,
    settings: TunerSettings,
    thresholds: HsvThresholds,
    previous_thresholds: HsvThresholds,
    stage: TuningStage,
    best_difference: usize,
}

impl ThresholdTuner {
    /// Starts tuning from all thresholds at zero.
    pub fn new(reference: ForegroundMask, settings: TunerSettings) -> Self {
        let best_difference = Self::reset_difference(&reference);
        info!(
            "tuning thresholds against a {}x{} reference mask",
            reference.width(),
            reference.height()
        );
        Self {
            reference,
            settings,
            thresholds: HsvThresholds::default(),
            previous_thresholds: HsvThresholds::default(),
            stage: TuningStage::TuningHue,
            best_difference,
        }
    }

    /// The worst possible difference, which any candidate improves on.
    fn reset_difference(reference: &ForegroundMask) -> usize {
        reference.width() as usize * reference.height() as usize
    }

    /// Feeds back the mask produced with the current thresholds.
    ///
    /// Returns the stage after the step. Once converged, further calls change nothing.
    pub fn update(&mut self, candidate: &ForegroundMask) -> TuningStage {
        let TunerSettings {
            tolerance,
            increase_step,
            decrease_step,
            hue_ceiling,
            saturation_ceiling,
            value_ceiling,
        } = self.settings;
        let stage = self.stage;
        let (threshold, ceiling) = match stage {
            TuningStage::TuningHue => (&mut self.thresholds.hue, hue_ceiling),
            TuningStage::TuningSaturation => (&mut self.thresholds.saturation, saturation_ceiling),
            TuningStage::TuningValue => (&mut self.thresholds.value, value_ceiling),
            TuningStage::Converged => return stage,
        };

        let difference = self.reference.difference(candidate);
        trace!(
            "{:?} at {} differs in {} pixels",
            stage,
            *threshold,
            difference
        );

        let before = *threshold;
        let advance = if *threshold >= ceiling || difference <= tolerance {
            true
        } else if difference <= self.best_difference {
            *threshold = threshold.saturating_add(increase_step.max(1)).min(ceiling);
            self.best_difference = difference;
            false
        } else {
            *threshold = threshold.saturating_sub(decrease_step);
            true
        };
        let after = *threshold;

        if before != after {
            self.previous_thresholds = self.thresholds;
            match stage {
                TuningStage::TuningHue => self.previous_thresholds.hue = before,
                TuningStage::TuningSaturation => self.previous_thresholds.saturation = before,
                TuningStage::TuningValue => self.previous_thresholds.value = before,
                TuningStage::Converged => {}
            }
        }

        if advance {
            self.stage = stage.next();
            self.best_difference = Self::reset_difference(&self.reference);
            info!(
                "{:?} settled at {}, moving on to {:?}",
                stage, after, self.stage
            );
            if self.stage == TuningStage::Converged {
                info!("thresholds converged at {:?}", self.thresholds);
            }
        }
        self.stage
    }

    pub fn thresholds(&self) -> HsvThresholds {
        self.thresholds
    }

    /// The thresholds before the most recent change.
    pub fn previous_thresholds(&self) -> HsvThresholds {
        self.previous_thresholds
    }

    pub fn stage(&self) -> TuningStage {
        self.stage
    }

    pub fn is_converged(&self) -> bool {
        self.stage == TuningStage::Converged
    }

    /// The smallest difference seen for the current channel.
    pub fn best_difference(&self) -> usize {
        self.best_difference
    }

    pub fn reference(&self) -> &ForegroundMask {
        &self.reference
    }
}
