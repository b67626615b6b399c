//! Network delay distributions (NDD)
//!
//! Every host pair of the network description carries a parametric one-way
//! delay model plus the probability `u` of the zero-delay atom. Families use
//! the location/scale convention: a standard distribution `F` is shifted by
//! `loc` and stretched by `scale`.
//!
//! ```json
//! { "dist": "gamma", "shape": 2.0, "loc": 0.5, "scale": 1.0, "u": 0.01 }
//! ```

use crate::error::{TradfError, TradfResult};
use serde::Deserialize;
use statrs::distribution::{
    Continuous, ContinuousCDF, Exp, Gamma, LogNormal, Normal, Uniform, Weibull,
};
use std::collections::HashMap;

/// `host -> host -> delay model`
pub type NetworkDescription = HashMap<String, HashMap<String, NetworkDelay>>;

/// Standardized (loc = 0, scale = 1) distribution family
#[derive(Debug, Clone)]
pub enum DelayFamily {
    Norm(Normal),
    Expon(Exp),
    Gamma(Gamma),
    LogNorm(LogNormal),
    WeibullMin(Weibull),
    Uniform(Uniform),
    /// All mass at zero
    Fixed,
}

impl DelayFamily {
    /// Build a family from its name and optional shape parameter
    pub fn from_name(name: &str, shape: Option<f64>) -> TradfResult<Self> {
        let needs_shape = |family: &str| {
            shape
                .filter(|s| *s > 0.0 && s.is_finite())
                .ok_or_else(|| {
                    TradfError::Distribution(format!(
                        "'{}' requires a positive shape parameter",
                        family
                    ))
                })
        };
        let invalid = |e: &dyn std::fmt::Display| TradfError::Distribution(e.to_string());

        let family = match name {
            "norm" => DelayFamily::Norm(Normal::new(0.0, 1.0).map_err(|e| invalid(&e))?),
            "expon" => DelayFamily::Expon(Exp::new(1.0).map_err(|e| invalid(&e))?),
            "gamma" => {
                let a = needs_shape("gamma")?;
                DelayFamily::Gamma(Gamma::new(a, 1.0).map_err(|e| invalid(&e))?)
            }
            "lognorm" => {
                let s = needs_shape("lognorm")?;
                DelayFamily::LogNorm(LogNormal::new(0.0, s).map_err(|e| invalid(&e))?)
            }
            "weibull_min" => {
                let c = needs_shape("weibull_min")?;
                DelayFamily::WeibullMin(Weibull::new(c, 1.0).map_err(|e| invalid(&e))?)
            }
            "uniform" => DelayFamily::Uniform(Uniform::new(0.0, 1.0).map_err(|e| invalid(&e))?),
            "fixed" => DelayFamily::Fixed,
            other => return Err(TradfError::UnknownDistribution(other.to_string())),
        };
        Ok(family)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DelayFamily::Norm(_) => "norm",
            DelayFamily::Expon(_) => "expon",
            DelayFamily::Gamma(_) => "gamma",
            DelayFamily::LogNorm(_) => "lognorm",
            DelayFamily::WeibullMin(_) => "weibull_min",
            DelayFamily::Uniform(_) => "uniform",
            DelayFamily::Fixed => "fixed",
        }
    }

    fn cdf(&self, z: f64) -> f64 {
        match self {
            DelayFamily::Norm(d) => d.cdf(z),
            DelayFamily::Expon(d) => if z <= 0.0 { 0.0 } else { d.cdf(z) },
            DelayFamily::Gamma(d) => if z <= 0.0 { 0.0 } else { d.cdf(z) },
            DelayFamily::LogNorm(d) => if z <= 0.0 { 0.0 } else { d.cdf(z) },
            DelayFamily::WeibullMin(d) => if z <= 0.0 { 0.0 } else { d.cdf(z) },
            DelayFamily::Uniform(_) => z.clamp(0.0, 1.0),
            DelayFamily::Fixed => if z >= 0.0 { 1.0 } else { 0.0 },
        }
    }

    fn pdf(&self, z: f64) -> f64 {
        match self {
            DelayFamily::Norm(d) => d.pdf(z),
            DelayFamily::Expon(d) => if z < 0.0 { 0.0 } else { d.pdf(z) },
            DelayFamily::Gamma(d) => if z <= 0.0 { 0.0 } else { d.pdf(z) },
            DelayFamily::LogNorm(d) => if z <= 0.0 { 0.0 } else { d.pdf(z) },
            DelayFamily::WeibullMin(d) => if z < 0.0 { 0.0 } else { d.pdf(z) },
            DelayFamily::Uniform(_) => if (0.0..=1.0).contains(&z) { 1.0 } else { 0.0 },
            DelayFamily::Fixed => 0.0,
        }
    }

    fn ppf(&self, p: f64) -> f64 {
        if !(0.0..=1.0).contains(&p) {
            return f64::NAN;
        }
        match self {
            DelayFamily::Norm(d) => d.inverse_cdf(p),
            DelayFamily::Expon(d) => d.inverse_cdf(p),
            DelayFamily::Gamma(d) => d.inverse_cdf(p),
            DelayFamily::LogNorm(d) => d.inverse_cdf(p),
            DelayFamily::WeibullMin(d) => d.inverse_cdf(p),
            DelayFamily::Uniform(d) => d.inverse_cdf(p),
            DelayFamily::Fixed => 0.0,
        }
    }
}

/// Raw network description entry
#[derive(Debug, Clone, Deserialize)]
struct NddDesc {
    dist: String,
    #[serde(default)]
    loc: f64,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    shape: Option<f64>,
    #[serde(default)]
    u: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// One-way delay model of a link
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "NddDesc")]
pub struct NetworkDelay {
    family: DelayFamily,
    loc: f64,
    scale: f64,
    /// Probability of the zero-delay atom
    atom: f64,
}

impl TryFrom<NddDesc> for NetworkDelay {
    type Error = TradfError;

    fn try_from(desc: NddDesc) -> TradfResult<Self> {
        let family = DelayFamily::from_name(&desc.dist, desc.shape)?;
        Self::new(family, desc.loc, desc.scale, desc.u)
    }
}

impl NetworkDelay {
    pub fn new(family: DelayFamily, loc: f64, scale: f64, atom: f64) -> TradfResult<Self> {
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(TradfError::Distribution(format!(
                "scale must be positive, got {}",
                scale
            )));
        }
        if !loc.is_finite() {
            return Err(TradfError::Distribution(format!("loc must be finite, got {}", loc)));
        }
        if !(0.0..=1.0).contains(&atom) {
            return Err(TradfError::Distribution(format!(
                "atom probability must be within [0, 1], got {}",
                atom
            )));
        }
        Ok(Self {
            family,
            loc,
            scale,
            atom,
        })
    }

    /// Deterministic zero delay, every packet arrives immediately
    pub fn zero_delay() -> Self {
        Self {
            family: DelayFamily::Fixed,
            loc: 0.0,
            scale: 1.0,
            atom: 0.0,
        }
    }

    pub fn family(&self) -> &DelayFamily {
        &self.family
    }

    pub fn atom(&self) -> f64 {
        self.atom
    }

    pub fn cdf(&self, x: f64) -> f64 {
        self.family.cdf((x - self.loc) / self.scale)
    }

    pub fn pdf(&self, x: f64) -> f64 {
        self.family.pdf((x - self.loc) / self.scale) / self.scale
    }

    /// Inverse CDF
    pub fn ppf(&self, p: f64) -> f64 {
        self.loc + self.scale * self.family.ppf(p)
    }

    /// Probability that a token sent with margin `dprime` is delivered in time
    pub fn delivery(&self, dprime: f64) -> f64 {
        (1.0 - self.atom) * self.cdf(dprime)
    }

    /// Derivative of [`delivery`](Self::delivery) with respect to `dprime`
    pub fn delivery_rate(&self, dprime: f64) -> f64 {
        (1.0 - self.atom) * self.pdf(dprime)
    }
}

/// Look up the delay model between two hosts
pub fn lookup<'a>(
    network: &'a NetworkDescription,
    src_host: &str,
    dst_host: &str,
) -> TradfResult<&'a NetworkDelay> {
    network
        .get(src_host)
        .and_then(|row| row.get(dst_host))
        .ok_or_else(|| TradfError::UnknownHostPair {
            src_host: src_host.to_string(),
            dst_host: dst_host.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn parse(json: &str) -> TradfResult<NetworkDelay> {
        serde_json::from_str::<NetworkDelay>(json).map_err(TradfError::from)
    }

    #[test]
    fn test_gamma_location_scale() {
        let ndd = parse(r#"{"dist":"gamma","shape":2.0,"loc":0.5,"scale":2.0}"#).unwrap();
        // standard gamma(2): F(z) = 1 - e^-z (1 + z)
        let z: f64 = 1.5;
        let expected = 1.0 - (-z).exp() * (1.0 + z);
        assert_abs_diff_eq!(ndd.cdf(0.5 + 2.0 * z), expected, epsilon = 1e-10);
        // f(z) = z e^-z, scaled by 1/scale
        assert_abs_diff_eq!(ndd.pdf(0.5 + 2.0 * z), z * (-z).exp() / 2.0, epsilon = 1e-10);
        assert_eq!(ndd.cdf(0.4), 0.0);
    }

    #[test]
    fn test_ppf_inverts_cdf() {
        for json in [
            r#"{"dist":"norm","loc":3.0,"scale":0.5}"#,
            r#"{"dist":"expon","loc":1.0,"scale":2.0}"#,
            r#"{"dist":"gamma","shape":3.0,"loc":0.2,"scale":1.5}"#,
            r#"{"dist":"lognorm","shape":0.4,"loc":0.0,"scale":2.0}"#,
            r#"{"dist":"weibull_min","shape":1.5,"loc":0.1,"scale":1.0}"#,
            r#"{"dist":"uniform","loc":1.0,"scale":4.0}"#,
        ] {
            let ndd = parse(json).unwrap();
            for p in [0.001, 0.25, 0.5, 0.9, 0.999] {
                assert_abs_diff_eq!(ndd.cdf(ndd.ppf(p)), p, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_gamma_quantile() {
        let ndd = parse(r#"{"dist":"gamma","shape":2.0,"loc":0.5,"scale":1.0}"#).unwrap();
        let x = ndd.ppf(0.999);
        assert_abs_diff_eq!(x, 0.5 + 9.2334, epsilon = 1e-3);
        assert_abs_diff_eq!(ndd.cdf(x), 0.999, epsilon = 1e-6);
        assert!(ndd.ppf(1.5).is_nan());
    }

    #[test]
    fn test_atom_scales_delivery() {
        let ndd = parse(r#"{"dist":"expon","loc":0.0,"scale":1.0,"u":0.1}"#).unwrap();
        assert_abs_diff_eq!(ndd.delivery(1.0), 0.9 * (1.0 - (-1.0f64).exp()), epsilon = 1e-12);
        assert_abs_diff_eq!(ndd.delivery_rate(1.0), 0.9 * (-1.0f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_delay() {
        let ndd = NetworkDelay::zero_delay();
        assert_eq!(ndd.delivery(2.0), 1.0);
        assert_eq!(ndd.delivery_rate(2.0), 0.0);
        assert_eq!(ndd.ppf(0.999), 0.0);
        assert_eq!(ndd.cdf(-0.1), 0.0);
    }

    #[test]
    fn test_rejects_bad_descriptions() {
        assert!(parse(r#"{"dist":"cauchy"}"#).is_err());
        assert!(parse(r#"{"dist":"gamma","loc":0.0,"scale":1.0}"#).is_err());
        assert!(parse(r#"{"dist":"norm","scale":-1.0}"#).is_err());
        assert!(parse(r#"{"dist":"norm","u":1.5}"#).is_err());
    }

    #[test]
    fn test_lookup_unknown_pair() {
        let mut network = NetworkDescription::new();
        network
            .entry("h1".into())
            .or_default()
            .insert("h2".into(), NetworkDelay::zero_delay());
        assert!(lookup(&network, "h1", "h2").is_ok());
        assert!(matches!(
            lookup(&network, "h2", "h1"),
            Err(TradfError::UnknownHostPair { .. })
        ));
    }
}
