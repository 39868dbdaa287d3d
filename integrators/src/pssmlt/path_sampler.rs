//! Path Samplers

use crate::bpt::*;
use crate::common::*;
use crate::path::estimate_radiance;
use core::bsdf::*;
use core::error::*;
use core::film::*;
use core::geometry::*;
use core::lm::*;
use core::sampler::*;
use core::scene::*;
use core::spectrum::*;
use std::fmt;
use std::str::FromStr;

/// Contributions of one primary sample space point.
#[derive(Clone, Debug, Default)]
pub struct Splats {
    splats: Vec<(Vector2f, Spectrum)>,
}

impl Splats {
    /// Remove every splat.
    pub fn clear(&mut self) {
        self.splats.clear();
    }

    /// Add a splat.
    ///
    /// * `raster` - Raster position.
    /// * `c`      - Contribution.
    pub fn push(&mut self, raster: Vector2f, c: Spectrum) {
        self.splats.push((raster, c));
    }

    /// Returns the number of splats.
    pub fn len(&self) -> usize {
        self.splats.len()
    }

    /// Returns `true` if there are no splats.
    pub fn is_empty(&self) -> bool {
        self.splats.is_empty()
    }

    /// Returns the scalar contribution I, the sum of splat luminances.
    pub fn sum_luminance(&self) -> Float {
        self.splats.iter().map(|(_, c)| c.luminance()).sum()
    }

    /// Splat every contribution scaled by `weight`.
    ///
    /// * `film`   - The film.
    /// * `weight` - Weight.
    pub fn accumulate(&self, film: &mut dyn FilmSink, weight: Float) {
        if weight == 0.0 {
            return;
        }
        for (raster, c) in self.splats.iter() {
            film.accumulate_contribution(raster, &(*c * weight));
        }
    }
}

/// Path sampler names.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathSamplerType {
    /// Eye paths with next event estimation.
    PathTracing,

    /// Every bidirectional strategy with MIS.
    Bidirectional,
}

impl FromStr for PathSamplerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pt" => Ok(Self::PathTracing),
            "bpt" => Ok(Self::Bidirectional),
            _ => Err(Error::config(format!("unknown path sampler '{}' (expected pt or bpt)", s))),
        }
    }
}

impl fmt::Display for PathSamplerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathTracing => write!(f, "pt"),
            Self::Bidirectional => write!(f, "bpt"),
        }
    }
}

/// Maps primary samples to light transport paths and their splats.
pub enum PathSampler<'a> {
    /// Path tracing.
    PathTracing { limits: PathLimits },

    /// Bidirectional path tracing.
    Bidirectional {
        limits: PathLimits,
        mis: &'a dyn MisWeight,
        pool: VertexPool,
    },
}

impl<'a> PathSampler<'a> {
    /// Create a path sampler.
    ///
    /// * `kind`   - Path sampler type.
    /// * `limits` - Russian roulette depth and maximum path length.
    /// * `mis`    - MIS weight for bidirectional sampling.
    pub fn new(kind: PathSamplerType, limits: PathLimits, mis: &'a dyn MisWeight) -> Self {
        match kind {
            PathSamplerType::PathTracing => Self::PathTracing { limits },
            PathSamplerType::Bidirectional => Self::Bidirectional {
                limits,
                mis,
                pool: VertexPool::new(),
            },
        }
    }

    /// Sample paths from the next values of `sampler` and replace `splats`
    /// with their contributions. The raster position is part of the sample.
    ///
    /// * `scene`   - The scene.
    /// * `sampler` - Primary samples.
    /// * `splats`  - Receives the contributions.
    pub fn sample_and_evaluate<S: Sampler + ?Sized>(&mut self, scene: &Scene, sampler: &mut S, splats: &mut Splats) {
        splats.clear();
        match self {
            Self::PathTracing { limits } => {
                let raster = sampler.next_vec2();
                let l = estimate_radiance(scene, sampler, limits, &raster);
                splats.push(raster, l);
            }
            Self::Bidirectional { limits, mis, pool } => {
                {
                    let arena = pool.arena();
                    let light = Subpath::sample(arena, scene, sampler, TransportDirection::LE, limits, None);
                    let eye = Subpath::sample(arena, scene, sampler, TransportDirection::EL, limits, None);
                    connect_subpaths(scene, &light, &eye, limits, *mis, |c| {
                        splats.push(c.raster, c.unweighted * c.weight);
                    });
                }
                pool.release();
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
