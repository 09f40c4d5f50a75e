//! Seams shared by daily plant models.
use crate::error::Result;

/// State that can be exchanged as a flat array.
///
/// Only the numeric part of a state travels through the array. Structure
/// that comes from configuration (soil topology, organ thresholds) is
/// rebuilt by the model and then overwritten with [`ModelState::load_slice`].
pub trait ModelState: Sized {
    fn to_vec(&self) -> Vec<f64>;

    /// Overwrite the numeric part of this state from a flat array.
    fn load_slice(&mut self, arr: &[f64]) -> Result<()>;

    fn array_len(&self) -> usize;
}

/// Core trait for daily plant models coupled to an environment.
///
/// The environment (soil) is read by every step and updated from the step's
/// report before the next day, so it is threaded through `run`.
pub trait DailyModel {
    type Params;
    type State: Clone;
    type Forcing;
    type Environment: Clone;
    type Report;
    type Series: SeriesOps<Self::Report>;

    /// Create the initial state from parameters and the environment.
    fn initialize_state(params: &Self::Params, env: &Self::Environment) -> Result<Self::State>;

    /// Advance one day. The input state is never modified; on error the
    /// caller keeps the previous state.
    fn step(
        state: &Self::State,
        params: &Self::Params,
        forcing: &Self::Forcing,
        env: &Self::Environment,
    ) -> Result<(Self::State, Self::Report)>;

    /// Feed the day's exchanges back into the environment.
    fn update_environment(env: &mut Self::Environment, report: &Self::Report) -> Result<()>;

    /// Run the model over a forcing series, stopping at the first error.
    ///
    /// Returns the collected outputs, the final state and the final environment.
    fn run(
        params: &Self::Params,
        forcing: &[Self::Forcing],
        env: &Self::Environment,
        initial_state: Option<&Self::State>,
    ) -> Result<(Self::Series, Self::State, Self::Environment)> {
        let mut env = env.clone();
        let mut state = match initial_state {
            Some(s) => s.clone(),
            None => Self::initialize_state(params, &env)?,
        };

        let mut outputs = Self::Series::with_capacity(forcing.len());

        for f in forcing {
            let (new_state, report) = Self::step(&state, params, f, &env)?;
            Self::update_environment(&mut env, &report)?;
            outputs.push(&report);
            state = new_state;
        }

        Ok((outputs, state, env))
    }
}

/// Operations required on the output series collection.
pub trait SeriesOps<R> {
    fn with_capacity(n: usize) -> Self;
    fn push(&mut self, report: &R);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
}
