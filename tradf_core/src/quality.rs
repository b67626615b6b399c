//! # Quality engine
//!
//! Estimates the output SNR of a schedule and its gradient with respect to
//! every actor's start time.
//!
//! Each actor carries three quantities:
//!
//! - **signal**: amplitude of the weighted chain from the inputs
//! - **noise**: power of the samples that actually arrive in time
//! - **gradient**: derivative of the noise power w.r.t. every start time
//!
//! Inputs seed their entry actor with `|w|` and `|w|²`. A channel `u -> v`
//! with weight `w` delivers a sample with probability
//! `dp = (1 - u) · CDF(dprime)`, where `dprime` is the gap between the
//! consumer's start (one period later for a backedge) and the producer's
//! finish. It forwards `|w| · signal(u)` and `w² · dp · noise(u)`; the
//! derivative of `dp` (the delay PDF) moves the gradient entries of both
//! endpoints.
//!
//! Acyclic graphs need one pass in scheduling order. Cyclic graphs are
//! iterated for a fixed number of rounds: each round re-seeds the actors with
//! what the backedges carried in the previous round and propagates again.
//! Backedges are visited in declaration order and only the last one into a
//! given actor is carried over.
//!
//! For a sink with normalized power `p = noise / signal²` the SNR is
//! `1 / (1 - p)`; the objective is the negated weighted mean over sinks.

use crate::config::QualityConfig;
use crate::graph::{Channel, ChannelKey, TradfGraph};
use nalgebra::DVector;

/// Smallest loss fraction `1 - noise / signal²` considered (SNR of 120 dB)
pub const MIN_LOSS_FRACTION: f64 = 1e-12;

/// Objective value and gradient of a schedule
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Negated weighted SNR, to be minimized
    pub value: f64,
    pub gradient: DVector<f64>,
}

impl Evaluation {
    /// Estimated SNR in decibel
    pub fn snr_db(&self) -> f64 {
        snr_db(self.value)
    }
}

/// `10 · log10(-value)`
pub fn snr_db(value: f64) -> f64 {
    10.0 * (-value).log10()
}

/// Per-evaluation scratch space
///
/// Nothing in here survives from one evaluation to the next; one state per
/// thread allows concurrent evaluation of the same graph.
#[derive(Debug, Clone)]
pub struct QualityState {
    signal: Vec<f64>,
    noise: Vec<f64>,
    gradient: Vec<DVector<f64>>,
    carried_signal: Vec<f64>,
    carried_noise: Vec<f64>,
    carried_gradient: Vec<DVector<f64>>,
    previous_noise: Vec<f64>,
    update: DVector<f64>,
    rounds: usize,
}

impl QualityState {
    pub fn new(actor_count: usize) -> Self {
        let zeros = || vec![DVector::<f64>::zeros(actor_count); actor_count];
        Self {
            signal: vec![0.0; actor_count],
            noise: vec![0.0; actor_count],
            gradient: zeros(),
            carried_signal: vec![0.0; actor_count],
            carried_noise: vec![0.0; actor_count],
            carried_gradient: zeros(),
            previous_noise: vec![0.0; actor_count],
            update: DVector::zeros(actor_count),
            rounds: 0,
        }
    }

    /// Propagation rounds run by the last evaluation
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn signal(&self) -> &[f64] {
        &self.signal
    }

    pub fn noise(&self) -> &[f64] {
        &self.noise
    }

    fn clear_carried(&mut self) {
        self.carried_signal.fill(0.0);
        self.carried_noise.fill(0.0);
        for g in &mut self.carried_gradient {
            g.fill(0.0);
        }
    }
}

/// Delivery statistics of one channel under a schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub key: ChannelKey,
    /// Probability of in-time delivery
    pub delivery: f64,
    /// Its derivative w.r.t. the margin
    pub delivery_rate: f64,
    /// Margin between consumer start and producer finish (0 for self-loops)
    pub dprime: f64,
    /// Tokens the channel must buffer (0 for self-loops)
    pub buffer_size: u64,
}

/// SNR objective over a fixed graph
#[derive(Debug, Clone)]
pub struct QualityEngine<'g> {
    graph: &'g TradfGraph,
    config: QualityConfig,
}

impl<'g> QualityEngine<'g> {
    pub fn new(graph: &'g TradfGraph, config: &QualityConfig) -> Self {
        Self {
            graph,
            config: config.clone(),
        }
    }

    pub fn graph(&self) -> &'g TradfGraph {
        self.graph
    }

    /// Fresh scratch space sized for the graph
    pub fn state(&self) -> QualityState {
        QualityState::new(self.graph.actor_count())
    }

    /// Evaluate with a throwaway state
    pub fn evaluate_once(&self, start_times: &[f64], period: f64) -> Evaluation {
        let mut state = self.state();
        self.evaluate(start_times, period, &mut state)
    }

    /// Objective and gradient for `start_times` under `period`
    pub fn evaluate(&self, start_times: &[f64], period: f64, state: &mut QualityState) -> Evaluation {
        state.clear_carried();
        state.rounds = 0;

        if !self.graph.is_cyclic() {
            self.seed(state);
            self.propagate(start_times, period, state);
            state.rounds = 1;
            return self.metric(state);
        }

        for round in 0..self.config.rounds {
            self.seed(state);
            self.propagate(start_times, period, state);
            state.rounds = round + 1;

            if let Some(tolerance) = self.config.residual_tolerance {
                let residual = state
                    .noise
                    .iter()
                    .zip(&state.previous_noise)
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max);
                if round > 0 && residual < tolerance {
                    log::debug!("quality propagation settled after {} rounds", round + 1);
                    break;
                }
                state.previous_noise.copy_from_slice(&state.noise);
            }

            self.carry_backedges(start_times, period, state);
        }
        self.metric(state)
    }

    /// Reset every actor to its input contribution plus what the backedges
    /// carried in the previous round
    fn seed(&self, state: &mut QualityState) {
        state.signal.copy_from_slice(&state.carried_signal);
        state.noise.copy_from_slice(&state.carried_noise);
        for (g, carried) in state.gradient.iter_mut().zip(&state.carried_gradient) {
            g.copy_from(carried);
        }

        for source in self.graph.sources() {
            let w = source.weight.abs();
            state.signal[source.actor] += w;
            state.noise[source.actor] += w * w;
        }
    }

    fn propagate(&self, start_times: &[f64], period: f64, state: &mut QualityState) {
        for key in self.graph.structure().scheduling_order() {
            let Some(channel) = self.graph.channel(key) else {
                continue;
            };
            self.transfer(channel, start_times, period, state, false);
        }
    }

    fn carry_backedges(&self, start_times: &[f64], period: f64, state: &mut QualityState) {
        state.clear_carried();
        for channel in self.graph.backedges().filter(|c| !c.is_self_loop()) {
            self.transfer(channel, start_times, period, state, true);
        }
    }

    /// Add the contribution of `channel` to its consumer, or store it as the
    /// carried-over state of the next round
    fn transfer(
        &self,
        channel: &Channel,
        start_times: &[f64],
        period: f64,
        state: &mut QualityState,
        carried: bool,
    ) {
        let (u, v) = channel.key();
        let dprime = self.dprime(channel, start_times, period);
        let (dp, ddp) = delivery(channel, dprime);
        let w = channel.weight.abs();
        let w2 = w * w;
        let noise_u = state.noise[u];

        state.update.copy_from(&state.gradient[u]);
        state.update *= dp;
        state.update[u] -= ddp * noise_u;
        state.update[v] += ddp * noise_u;

        let signal = w * state.signal[u];
        let noise = w2 * dp * noise_u;
        if carried {
            // a later backedge into the same actor replaces an earlier one
            state.carried_signal[v] = signal;
            state.carried_noise[v] = noise;
            state.carried_gradient[v].copy_from(&state.update);
            state.carried_gradient[v] *= w2;
        } else {
            state.signal[v] += signal;
            state.noise[v] += noise;
            state.gradient[v].axpy(w2, &state.update, 1.0);
        }
    }

    fn metric(&self, state: &QualityState) -> Evaluation {
        let mut total_weight = 0.0;
        let mut weighted_snr = 0.0;
        let mut weighted_gradient = DVector::<f64>::zeros(self.graph.actor_count());

        for sink in self.graph.sinks() {
            // sign of the output weight is kept
            let w = sink.weight;
            let signal_power = state.signal[sink.actor].powi(2);
            total_weight += w;

            if signal_power <= 0.0 {
                weighted_snr += w;
                continue;
            }

            let loss = 1.0 - state.noise[sink.actor] / signal_power;
            if loss < MIN_LOSS_FRACTION {
                weighted_snr += w / MIN_LOSS_FRACTION;
                continue;
            }

            weighted_snr += w / loss;
            weighted_gradient.axpy(
                w / (signal_power * loss * loss),
                &state.gradient[sink.actor],
                1.0,
            );
        }

        Evaluation {
            value: -weighted_snr / total_weight,
            gradient: weighted_gradient / -total_weight,
        }
    }

    /// Margin between the consumer's start and the producer's finish
    pub fn dprime(&self, channel: &Channel, start_times: &[f64], period: f64) -> f64 {
        let (u, v) = channel.key();
        let finish = start_times[u] + self.graph.wcet(u);
        let mut start = start_times[v];
        if channel.is_backedge {
            start += period;
        }
        start - finish
    }

    /// Delivery probability, margin and buffer size of every channel
    pub fn channel_stats(&self, start_times: &[f64], period: f64, buffer_epsilon: f64) -> Vec<ChannelStats> {
        self.graph
            .channels()
            .iter()
            .map(|channel| {
                if channel.is_self_loop() {
                    return ChannelStats {
                        key: channel.key(),
                        delivery: 1.0,
                        delivery_rate: 0.0,
                        dprime: 0.0,
                        buffer_size: 0,
                    };
                }

                let dprime = self.dprime(channel, start_times, period);
                if dprime <= 0.0 {
                    let (u, v) = channel.key();
                    log::warn!(
                        "dprime of ({},{}) is not positive [Ts({})={:.3}, WCET({})={:.3}, Ts({})={:.3}, period={}]",
                        self.graph.actor_name(u),
                        self.graph.actor_name(v),
                        self.graph.actor_name(u),
                        start_times[u],
                        self.graph.actor_name(u),
                        self.graph.wcet(u),
                        self.graph.actor_name(v),
                        start_times[v],
                        period
                    );
                }
                let (delivery, delivery_rate) = delivery(channel, dprime);
                ChannelStats {
                    key: channel.key(),
                    delivery,
                    delivery_rate,
                    dprime,
                    buffer_size: buffer_size(channel, dprime, period, buffer_epsilon),
                }
            })
            .collect()
    }
}

fn delivery(channel: &Channel, dprime: f64) -> (f64, f64) {
    match &channel.ndd {
        Some(ndd) => (ndd.delivery(dprime), ndd.delivery_rate(dprime)),
        None => (1.0, 0.0),
    }
}

/// Tokens in flight: margin plus the spread of the delay, in periods
fn buffer_size(channel: &Channel, dprime: f64, period: f64, epsilon: f64) -> u64 {
    let Some(ndd) = &channel.ndd else {
        return 0;
    };
    if period <= 0.0 {
        return 0;
    }
    let spread = ndd.ppf(1.0 - epsilon) - ndd.ppf(epsilon);
    let tokens = ((dprime + spread) / period).ceil();
    if tokens.is_finite() && tokens > 0.0 {
        tokens as u64
    } else {
        0
    }
}
