//! Collision-avoidance manoeuvre search.
//!
//! Given the encounter geometry of a [`Cdm`], a genetic algorithm searches
//! for a constant-thrust burn by the primary that raises the miss distance
//! to a target while spending as little delta-v as possible.
//!
//! The encounter is modelled with linear relative motion: the burn changes
//! the relative velocity by `-thrust * duration` and, over the time left
//! until closest approach, shifts the relative position accordingly. The
//! new closest approach is found along the updated relative velocity.

use crate::cdm::{Cdm, RelativeState};
use glam::DVec3;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AvoidanceError {
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("mutation rate {0} is outside [0, 1]")]
    BadMutationRate(f64),
}

/// One candidate burn: thrust acceleration in the primary's RTN frame
/// (m/s^2) held for `duration` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manoeuvre {
    pub thrust: DVec3,
    pub duration: f64,
}

impl Manoeuvre {
    pub const NONE: Self = Self {
        thrust: DVec3::ZERO,
        duration: 0.0,
    };

    pub fn delta_v(&self) -> DVec3 {
        self.thrust * self.duration
    }

    /// Sum of the absolute RTN delta-v components, m/s.
    pub fn fuel_cost(&self) -> f64 {
        self.thrust.abs().element_sum() * self.duration
    }
}

/// Closest approach after a manoeuvre.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    /// Metres.
    pub miss_distance: f64,
    /// Metres per second.
    pub relative_speed: f64,
    /// Seconds the closest approach moved relative to the predicted TCA.
    pub tca_shift: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvoidanceConfig {
    pub population: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    /// Miss distance the search aims for, metres.
    pub desired_miss_distance: f64,
    /// Largest initial thrust per axis, m/s^2.
    pub max_thrust: f64,
    /// Initial burn durations are drawn from `[min_duration, max_duration]`, seconds.
    pub min_duration: f64,
    pub max_duration: f64,
    /// Time from the end of the burn to the predicted TCA, seconds.
    pub lead_time: f64,
    pub seed: u64,
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        Self {
            population: 50,
            generations: 100,
            mutation_rate: 0.1,
            desired_miss_distance: 5_000.0,
            max_thrust: 1e-2,
            min_duration: 1.0,
            max_duration: 10.0,
            lead_time: 86_400.0,
            seed: 42,
        }
    }
}

impl AvoidanceConfig {
    fn validate(&self) -> Result<(), AvoidanceError> {
        if self.population < 2 {
            return Err(AvoidanceError::NonPositive("population beyond one"));
        }
        if self.generations == 0 {
            return Err(AvoidanceError::NonPositive("generations"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(AvoidanceError::BadMutationRate(self.mutation_rate));
        }
        if !(self.max_thrust > 0.0) {
            return Err(AvoidanceError::NonPositive("max thrust"));
        }
        if !(self.min_duration > 0.0 && self.max_duration >= self.min_duration) {
            return Err(AvoidanceError::NonPositive("duration range"));
        }
        if !(self.lead_time >= 0.0) {
            return Err(AvoidanceError::NonPositive("lead time"));
        }
        Ok(())
    }
}

/// Closest approach of relative motion `r + v t`.
///
/// ### Returns
/// `(t, distance)`, with `t = 0` when the relative velocity vanishes.
pub fn closest_approach(r: DVec3, v: DVec3) -> (f64, f64) {
    let vv = v.length_squared();
    if vv < 1e-12 {
        return (0.0, r.length());
    }
    let t = -r.dot(v) / vv;
    (t, (r + v * t).length())
}

/// Applies `m` to the encounter `state`. The burn ends `lead_time` seconds
/// before the predicted TCA.
pub fn simulate(state: &RelativeState, m: &Manoeuvre, lead_time: f64) -> Encounter {
    let dv = m.delta_v();
    // The secondary's velocity relative to the primary drops by the primary's delta-v.
    let v = state.velocity - dv;
    let r = state.position - dv * (lead_time + 0.5 * m.duration);
    let (tca_shift, miss_distance) = closest_approach(r, v);
    Encounter {
        miss_distance,
        relative_speed: v.length(),
        tca_shift,
    }
}

/// Scores an outcome: high when the miss distance reaches `desired`, lower
/// with fuel spent, with a small bonus for slow encounters.
pub fn fitness(encounter: &Encounter, fuel_cost: f64, desired: f64) -> f64 {
    let shortfall = (desired - encounter.miss_distance).max(0.0);
    let mut score = (1000.0 / (shortfall + 0.1).sqrt() - 1e3 * fuel_cost).max(0.0);
    score += (10.0 - encounter.relative_speed / 10.0).max(0.0);
    score
}

fn random_manoeuvre(rng: &mut StdRng, cfg: &AvoidanceConfig) -> Manoeuvre {
    let mut axis = || rng.random_range(-cfg.max_thrust..=cfg.max_thrust);
    let thrust = DVec3::new(axis(), axis(), axis());
    Manoeuvre {
        thrust,
        duration: rng.random_range(cfg.min_duration..=cfg.max_duration),
    }
}

/// Blend of two parents with a random weight.
fn crossover(a: &Manoeuvre, b: &Manoeuvre, rng: &mut StdRng) -> Manoeuvre {
    let alpha: f64 = rng.random_range(0.0..=1.0);
    Manoeuvre {
        thrust: a.thrust * alpha + b.thrust * (1.0 - alpha),
        duration: a.duration * alpha + b.duration * (1.0 - alpha),
    }
}

fn mutate(m: Manoeuvre, rng: &mut StdRng, rate: f64) -> Manoeuvre {
    if !rng.random_bool(rate) {
        return m;
    }
    let mut jitter = |scale: f64| rng.random_range(-scale..=scale);
    let thrust = m.thrust + DVec3::new(jitter(1e-4), jitter(1e-4), jitter(1e-4));
    Manoeuvre {
        thrust,
        duration: (m.duration + jitter(0.3)).max(0.0),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub manoeuvre: Manoeuvre,
    pub encounter: Encounter,
    pub fuel_cost: f64,
    pub fitness: f64,
}

fn evaluate(state: &RelativeState, m: Manoeuvre, cfg: &AvoidanceConfig) -> Candidate {
    let encounter = simulate(state, &m, cfg.lead_time);
    let fuel_cost = m.fuel_cost();
    Candidate {
        manoeuvre: m,
        encounter,
        fuel_cost,
        fitness: fitness(&encounter, fuel_cost, cfg.desired_miss_distance),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Solution {
    /// Best candidate seen in any generation.
    pub best: Candidate,
    /// Encounter without any manoeuvre.
    pub baseline: Encounter,
    /// Best fitness of each generation.
    pub history: Vec<f64>,
}

/// Runs the genetic search on the encounter of `cdm`.
pub fn optimise(cdm: &Cdm, cfg: &AvoidanceConfig) -> Result<Solution, AvoidanceError> {
    optimise_state(&cdm.relative.relative_state, cfg)
}

/// Runs the genetic search on a relative state at TCA.
///
/// Parents are picked by fitness-proportional (roulette) selection; when
/// every candidate scores zero they are picked uniformly instead.
pub fn optimise_state(state: &RelativeState, cfg: &AvoidanceConfig) -> Result<Solution, AvoidanceError> {
    cfg.validate()?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let baseline = simulate(state, &Manoeuvre::NONE, cfg.lead_time);
    let mut population: Vec<Manoeuvre> = (0..cfg.population)
        .map(|_| random_manoeuvre(&mut rng, cfg))
        .collect();
    let mut best: Option<Candidate> = None;
    let mut history = Vec::with_capacity(cfg.generations);

    for generation in 0..cfg.generations {
        let scored: Vec<Candidate> = population.iter().map(|&m| evaluate(state, m, cfg)).collect();

        let Some(top) = scored
            .iter()
            .copied()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
        else {
            break;
        };
        log::debug!(
            "generation {generation}: best fitness {:.3}, fuel {:.5} m/s, miss {:.1} m",
            top.fitness,
            top.fuel_cost,
            top.encounter.miss_distance
        );
        history.push(top.fitness);
        if best.is_none_or(|b| top.fitness > b.fitness) {
            best = Some(top);
        }

        let roulette = WeightedIndex::new(scored.iter().map(|c| c.fitness)).ok();
        let pick = |rng: &mut StdRng| match &roulette {
            Some(w) => population[w.sample(rng)],
            None => population[rng.random_range(0..population.len())],
        };

        let mut next = Vec::with_capacity(cfg.population);
        while next.len() < cfg.population {
            let (a, b) = (pick(&mut rng), pick(&mut rng));
            next.push(mutate(crossover(&a, &b, &mut rng), &mut rng, cfg.mutation_rate));
            if next.len() < cfg.population {
                next.push(mutate(crossover(&b, &a, &mut rng), &mut rng, cfg.mutation_rate));
            }
        }
        population = next;
    }

    let best = best.unwrap_or_else(|| evaluate(state, Manoeuvre::NONE, cfg));
    log::info!(
        "best manoeuvre: delta-v {:.4} m/s, miss distance {:.1} m (was {:.1} m)",
        best.manoeuvre.delta_v().length(),
        best.encounter.miss_distance,
        baseline.miss_distance
    );
    Ok(Solution {
        best,
        baseline,
        history,
    })
}
