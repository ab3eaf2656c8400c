use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::{positioning, pressure, progress};

pub const FALLBACK_TIP: &str = "Keep climbing! Every attempt teaches you something about the route.";

/// Coaching tips keyed by submetric label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TipBook {
    tips: HashMap<String, Vec<String>>,
}

impl Default for TipBook {
    fn default() -> Self {
        let entries: [(&str, &[&str]); 6] = [
            (
                pressure::EFFICIENCY,
                &[
                    "Trust your feet on the first moves; push with the legs before pulling with the arms.",
                    "Weight the starting holds fully before moving on instead of rushing through them.",
                ],
            ),
            (
                pressure::ADJUSTMENT,
                &[
                    "Commit to each grip. Pick the hand position once and hold it instead of readjusting.",
                    "Look at the hold before you reach so your hand lands in the right spot the first time.",
                ],
            ),
            (
                positioning::ARM_ANGLE,
                &[
                    "Climb with straight arms and hang off your skeleton; bent arms burn out fast.",
                    "Drop your hips and let your arms extend while you look for the next foothold.",
                ],
            ),
            (
                positioning::SMOOTHNESS,
                &[
                    "Keep your hips close to the wall while both hands are on. Less swinging means less effort.",
                    "Move your centre of gravity deliberately between holds instead of swinging into the next one.",
                ],
            ),
            (
                progress::HOLD_SCORE,
                &[
                    "Read the whole route from the ground before starting so you know where the crux is.",
                    "Rest on the big holds before the hard section and go for the top with a plan.",
                ],
            ),
            (
                progress::PATHFINDING,
                &[
                    "Use more of the holds on the way up; small intermediate holds make big moves easier.",
                    "Try matching hands on a hold to free up a better sequence.",
                ],
            ),
        ];

        let tips = entries
            .iter()
            .map(|(label, tips)| {
                (
                    label.to_string(),
                    tips.iter().map(|tip| tip.to_string()).collect(),
                )
            })
            .collect();

        Self { tips }
    }
}

impl TipBook {
    pub fn empty() -> Self {
        Self {
            tips: HashMap::new(),
        }
    }

    pub fn tips_for(&self, label: &str) -> &[String] {
        self.tips.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the tips for `label`; an empty list removes it.
    pub fn set_tips(&mut self, label: &str, tips: Vec<String>) {
        if tips.is_empty() {
            self.tips.remove(label);
        } else {
            self.tips.insert(label.to_string(), tips);
        }
    }

    /// Overlay `overrides` on top of this book, label by label.
    pub fn merged(mut self, overrides: &TipBook) -> Self {
        for (label, tips) in &overrides.tips {
            self.set_tips(label, tips.clone());
        }
        self
    }

    /// A random tip for `label`, or the fallback when there is none.
    pub fn pick<R: Rng + ?Sized>(&self, label: Option<&str>, rng: &mut R) -> String {
        label
            .and_then(|label| self.tips_for(label).choose(rng))
            .cloned()
            .unwrap_or_else(|| FALLBACK_TIP.to_string())
    }
}
