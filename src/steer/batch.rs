//! Batch ticking
//!
//! Agents don't share mutable state, so a tick over many agents is a
//! parallel map. Each worker owns one agent's state slot.

use rayon::prelude::*;

use super::control::{TickInput, TickOutput, control};
use crate::settings::{MovementSettings, PersistentState};

/// Run [`control`] for every agent in parallel
///
/// `inputs[i]` pairs with `states[i]`, which is updated in place. Extra
/// entries in the longer slice are left alone.
pub fn control_batch(
    settings: &MovementSettings,
    inputs: &[TickInput<'_>],
    states: &mut [PersistentState],
) -> Vec<TickOutput> {
    if inputs.len() != states.len() {
        log::warn!(
            "control_batch: {} inputs but {} states, ticking {}",
            inputs.len(),
            states.len(),
            inputs.len().min(states.len())
        );
    }

    inputs
        .par_iter()
        .zip(states.par_iter_mut())
        .map(|(input, state)| {
            let (output, next) = control(settings, input, *state);
            *state = next;
            output
        })
        .collect()
}
