//! Data-center server provisioning
//!
//! A state is the number of active servers together with the number of
//! requests that arrived during the last period. Each decision sets the
//! number of servers for the next period; the next arrival count is
//! Poisson distributed with a rate that follows the current load (low,
//! normal or high traffic). The Poisson tail beyond the largest
//! representable arrival count is folded into that count.
//!
//! Episodes last a fixed number of decisions and are scored against a
//! cost budget. Every period costs the running servers, the number of
//! servers switched on or off, and a queueing penalty that grows sharply
//! once arrivals exceed capacity. The final state is charged its queueing
//! penalty once more when the episode closes.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ssbq_core::{Environment, OutcomeLevel, Result, Scoring, SsbqError, Transition};

/// Number of active servers and requests of the last period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerLoad {
    pub servers: u8,
    pub arrivals: u8,
}

impl ServerLoad {
    pub fn new(servers: u8, arrivals: u8) -> Self {
        Self { servers, arrivals }
    }

    /// Queueing penalty of serving `arrivals` with `servers`
    pub fn queue_cost(&self) -> f64 {
        let arrivals = f64::from(self.arrivals);
        let servers = f64::from(self.servers);
        if arrivals < servers {
            arrivals * arrivals / servers
        } else {
            arrivals * (servers + 10.0 * (arrivals - servers)) / servers
        }
    }
}

impl fmt::Display for ServerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{:02}{:02}", self.servers, self.arrivals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provision {
    /// Run this many servers next period
    Servers(u8),
    Reinit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCenterConfig {
    pub max_servers: u8,
    pub max_arrivals: u8,

    /// Arrival counts from which traffic is considered normal, then high
    pub normal_from: u8,
    pub high_from: u8,

    /// Poisson rates for low, normal and high traffic
    pub low_rate: f64,
    pub normal_rate: f64,
    pub high_rate: f64,

    pub horizon: usize,
    pub budget: f64,
    pub initial_servers: u8,
    pub initial_arrivals: u8,
}

impl Default for DataCenterConfig {
    fn default() -> Self {
        Self {
            max_servers: 30,
            max_arrivals: 90,
            normal_from: 20,
            high_from: 40,
            low_rate: 15.0,
            normal_rate: 45.0,
            high_rate: 75.0,
            horizon: 20,
            budget: 2000.0,
            initial_servers: 15,
            initial_arrivals: 15,
        }
    }
}

impl DataCenterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_servers == 0 {
            return Err(SsbqError::Config("at least one server is required".to_string()));
        }
        if self.normal_from > self.high_from {
            return Err(SsbqError::Config(format!(
                "normal traffic threshold {} exceeds high traffic threshold {}",
                self.normal_from, self.high_from
            )));
        }
        for rate in [self.low_rate, self.normal_rate, self.high_rate] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(SsbqError::Config(format!(
                    "arrival rates must be positive, got {rate}"
                )));
            }
        }
        if self.horizon == 0 {
            return Err(SsbqError::Config("horizon must be positive".to_string()));
        }
        if !self.budget.is_finite() {
            return Err(SsbqError::Config("budget must be finite".to_string()));
        }
        if !(1..=self.max_servers).contains(&self.initial_servers)
            || self.initial_arrivals > self.max_arrivals
        {
            return Err(SsbqError::Config(format!(
                "initial load {} lies outside the state space",
                ServerLoad::new(self.initial_servers, self.initial_arrivals)
            )));
        }
        Ok(())
    }
}

/// Poisson pmf over `0..=max`, the tail mass added to `max`
fn truncated_poisson(rate: f64, max: u8) -> Vec<f64> {
    let mut pmf = Vec::with_capacity(usize::from(max) + 1);
    let mut p = (-rate).exp();
    for k in 0..=max {
        if k > 0 {
            p *= rate / f64::from(k);
        }
        pmf.push(p);
    }
    let head: f64 = pmf[..pmf.len() - 1].iter().sum();
    if let Some(last) = pmf.last_mut() {
        *last = (1.0 - head).max(0.0);
    }
    pmf
}

#[derive(Debug, Clone)]
pub struct DataCenter {
    config: DataCenterConfig,
    states: Vec<ServerLoad>,
    actions: Vec<Provision>,
    levels: Vec<OutcomeLevel>,
    initial: ServerLoad,
    /// Arrival pmf for low, normal and high traffic
    arrivals: [Vec<f64>; 3],
}

impl DataCenter {
    pub fn new(config: DataCenterConfig) -> Result<Self> {
        config.validate()?;
        let states = (1..=config.max_servers)
            .flat_map(|servers| {
                (0..=config.max_arrivals).map(move |arrivals| ServerLoad::new(servers, arrivals))
            })
            .collect::<Vec<_>>();
        let actions = std::iter::once(Provision::Reinit)
            .chain((1..=config.max_servers).map(Provision::Servers))
            .collect();
        let arrivals = [
            truncated_poisson(config.low_rate, config.max_arrivals),
            truncated_poisson(config.normal_rate, config.max_arrivals),
            truncated_poisson(config.high_rate, config.max_arrivals),
        ];
        debug!(
            "Data center with {} states, budget {} over {} periods",
            states.len(),
            config.budget,
            config.horizon
        );

        Ok(Self {
            initial: ServerLoad::new(config.initial_servers, config.initial_arrivals),
            config,
            states,
            actions,
            levels: vec![OutcomeLevel::new("episode")],
            arrivals,
        })
    }

    pub fn config(&self) -> &DataCenterConfig {
        &self.config
    }

    fn contains(&self, load: &ServerLoad) -> bool {
        (1..=self.config.max_servers).contains(&load.servers)
            && load.arrivals <= self.config.max_arrivals
    }

    fn check(&self, load: &ServerLoad) -> Result<()> {
        if self.contains(load) {
            Ok(())
        } else {
            Err(SsbqError::unrecognized_state(load))
        }
    }

    /// Arrival distribution for the period following `load`
    pub fn arrival_pmf(&self, load: &ServerLoad) -> &[f64] {
        if load.arrivals < self.config.normal_from {
            &self.arrivals[0]
        } else if load.arrivals < self.config.high_from {
            &self.arrivals[1]
        } else {
            &self.arrivals[2]
        }
    }
}

impl Environment for DataCenter {
    type State = ServerLoad;
    type Action = Provision;

    fn name(&self) -> &str {
        "datacenter"
    }

    fn states(&self) -> &[ServerLoad] {
        &self.states
    }

    fn actions(&self) -> &[Provision] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &ServerLoad) -> Result<Vec<Provision>> {
        self.check(state)?;
        Ok(self.actions[1..].to_vec())
    }

    fn is_terminal(&self, _state: &ServerLoad) -> bool {
        false
    }

    fn outcome_of(&self, state: &ServerLoad) -> Result<OutcomeLevel> {
        Err(SsbqError::unrecognized_state(state))
    }

    fn transition(&self, state: &ServerLoad, action: &Provision) -> Result<Transition<ServerLoad>> {
        self.check(state)?;
        match *action {
            Provision::Reinit => Ok(Transition::certain(self.initial)),
            Provision::Servers(servers) if (1..=self.config.max_servers).contains(&servers) => {
                Ok(Transition::new(
                    self.arrival_pmf(state)
                        .iter()
                        .zip(0..=self.config.max_arrivals)
                        .filter(|(p, _)| **p > 0.0)
                        .map(|(p, arrivals)| (ServerLoad::new(servers, arrivals), *p))
                        .collect(),
                ))
            }
            Provision::Servers(_) => Err(SsbqError::illegal_action(state, action)),
        }
    }

    fn initial_state(&self) -> &ServerLoad {
        &self.initial
    }

    fn reinit_action(&self) -> Provision {
        Provision::Reinit
    }

    fn horizon(&self) -> Option<usize> {
        Some(self.config.horizon)
    }

    fn scoring(&self) -> Scoring {
        Scoring::CostBudget {
            budget: self.config.budget,
        }
    }

    fn step_cost(&self, state: &ServerLoad, next_state: &ServerLoad) -> Result<f64> {
        self.check(state)?;
        self.check(next_state)?;
        let servers = f64::from(state.servers);
        let switched = f64::from(state.servers.abs_diff(next_state.servers));
        Ok(servers + switched + state.queue_cost())
    }

    fn closing_cost(&self, state: &ServerLoad) -> Result<f64> {
        self.check(state)?;
        Ok(state.queue_cost())
    }
}
