use super::noise::simplex3;
use nalgebra::Vector3;

/// The terrain parameters of a solid planet. Heights are expressed in the same units as the planet
/// radius, frequencies in cycles per unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainSettings {
    pub continents_fragmentation: f64,
    pub continent_base_height: f64,

    pub max_bump_height: f64,
    pub bumps_frequency: f64,

    pub max_mountain_height: f64,
    pub mountains_frequency: f64,
    pub mountains_min_value: f64,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        TerrainSettings {
            continents_fragmentation: 0.47,
            continent_base_height: 5e3,
            max_bump_height: 1.5e3,
            bumps_frequency: 3e-5,
            max_mountain_height: 20e3,
            mountains_frequency: 10e-6,
            mountains_min_value: 0.5,
        }
    }
}

impl TerrainSettings {
    /// Settings that keep the frequencies but produce no relief at all
    pub fn flat() -> TerrainSettings {
        TerrainSettings {
            continent_base_height: 0.0,
            max_bump_height: 0.0,
            max_mountain_height: 0.0,
            ..TerrainSettings::default()
        }
    }
}

/// A crater centered on `position`, a point on the unit sphere. The radius is measured on the unit
/// sphere as well, the depth in planet units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crater {
    pub position: Vector3<f64>,
    pub radius: f64,
    pub max_depth: f64,
    pub steepness: f64,
}

impl Crater {
    /// Depth contribution of this crater at `unit_position` and its gradient with respect to
    /// `unit_position`. Zero outside of the crater.
    fn evaluate(&self, unit_position: &Vector3<f64>) -> (f64, Vector3<f64>) {
        let delta = unit_position - self.position;
        let distance_squared = delta.norm_squared();
        if distance_squared >= self.radius * self.radius {
            return (0.0, Vector3::zeros());
        }

        // The bowl follows (d/r)^8 - 1, steeper walls reach the flat floor sooner
        let t2 = distance_squared / (self.radius * self.radius);
        let t8 = t2 * t2 * t2 * t2;
        let scale = self.steepness * self.max_depth;
        let bowl = scale * (t8 - 1.0);
        if bowl <= -self.max_depth {
            return (-self.max_depth, Vector3::zeros());
        }

        // d/dp (t^8) = 8 t^6 (p - c) / r^2
        let gradient = delta * (scale * 8.0 * t2 * t2 * t2 / (self.radius * self.radius));
        (bowl, gradient)
    }
}

/// The kinds of bodies that carry a terrain. Only the layers differ between them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum PlanetKind {
    /// Continents, mountains and bumps
    Telluric { terrain: TerrainSettings },
    /// Barren bodies with bumps and craters
    Anomaly {
        terrain: TerrainSettings,
        #[serde(default)]
        craters: Vec<Crater>,
    },
    /// No solid surface
    Gas,
}

/// Elevation and its gradient at a single point. The gradient lives in the ambient planet frame,
/// not in tangent space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ElevationSample {
    pub elevation: f64,
    pub gradient: Vector3<f64>,
}

impl ElevationSample {
    pub fn zero() -> ElevationSample {
        ElevationSample { elevation: 0.0, gradient: Vector3::zeros() }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NoiseShape {
    Simplex,
    /// Absolute value folded simplex noise, sharp crests where the noise crosses zero
    Ridged,
}

/// Fractal sum of simplex octaves remapped to `[0, 1]`. Values below `min_value` are cut off and the
/// remainder is stretched back to `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FractalLayer {
    pub shape: NoiseShape,
    pub frequency: f64,
    pub octaves: u32,
    pub decay: f64,
    pub lacunarity: f64,
    pub min_value: f64,
}

impl FractalLayer {
    pub fn evaluate(&self, position: &Vector3<f64>) -> ElevationSample {
        let mut value = 0.0;
        let mut gradient = Vector3::zeros();
        let mut total_amplitude = 0.0;

        for octave in 0..self.octaves {
            let frequency = self.frequency * self.lacunarity.powi(octave as i32);
            let amplitude = 1.0 / self.decay.powi(octave as i32);

            let (noise, noise_gradient) = simplex3(&(position * frequency));
            let (octave_value, octave_gradient) = match self.shape {
                NoiseShape::Simplex => (0.5 * (noise + 1.0), noise_gradient * 0.5),
                NoiseShape::Ridged => (1.0 - noise.abs(), noise_gradient * -noise.signum()),
            };

            // Keep every octave inside [0, 1] so the remapped sum is too
            let (octave_value, octave_gradient) = if octave_value < 0.0 {
                (0.0, Vector3::zeros())
            } else if octave_value > 1.0 {
                (1.0, Vector3::zeros())
            } else {
                (octave_value, octave_gradient)
            };

            value += octave_value * amplitude;
            gradient += octave_gradient * (frequency * amplitude);
            total_amplitude += amplitude;
        }

        if total_amplitude > 0.0 {
            value /= total_amplitude;
            gradient /= total_amplitude;
        }

        minimum_value(value, gradient, self.min_value)
    }
}

/// Clamps `value` at `min_value` and rescales the rest to `[0, 1]`.
pub fn minimum_value(value: f64, gradient: Vector3<f64>, min_value: f64) -> ElevationSample {
    if value <= min_value || min_value >= 1.0 {
        return ElevationSample::zero();
    }
    let range = 1.0 - min_value;
    ElevationSample {
        elevation: (value - min_value) / range,
        gradient: gradient / range,
    }
}

/// Procedural elevation of a planet, composed of independent layers. The field is immutable once
/// built and is shared with the workers that generate chunks.
#[derive(Clone, Debug)]
pub struct ElevationField {
    continents: Option<FractalLayer>,
    mountains: Option<FractalLayer>,
    bumps: Option<FractalLayer>,
    craters: Vec<Crater>,
    continent_base_height: f64,
    max_mountain_height: f64,
    max_bump_height: f64,
    seed: Vector3<f64>,
}

impl ElevationField {
    pub fn new(kind: &PlanetKind, seed: Vector3<f64>) -> ElevationField {
        let mut field = ElevationField {
            continents: None,
            mountains: None,
            bumps: None,
            craters: Vec::new(),
            continent_base_height: 0.0,
            max_mountain_height: 0.0,
            max_bump_height: 0.0,
            seed,
        };

        match kind {
            PlanetKind::Telluric { terrain } => {
                field.continents = Some(continents_layer(terrain));
                field.mountains = Some(mountains_layer(terrain));
                field.bumps = Some(bumps_layer(terrain));
                field.continent_base_height = terrain.continent_base_height;
                field.max_mountain_height = terrain.max_mountain_height;
                field.max_bump_height = terrain.max_bump_height;
            }
            PlanetKind::Anomaly { terrain, craters } => {
                field.bumps = Some(bumps_layer(terrain));
                field.max_bump_height = terrain.max_bump_height;
                field.craters = craters.clone();
            }
            PlanetKind::Gas => {}
        }

        field
    }

    /// A field without any relief
    pub fn flat() -> ElevationField {
        ElevationField::new(&PlanetKind::Gas, Vector3::zeros())
    }

    /// Evaluates the elevation at a point of the unit sphere. Noise layers are sampled at
    /// `unit_position * frequency_scale` (usually the planet radius) so the returned gradient is
    /// expressed per planet unit.
    pub fn evaluate(&self, unit_position: &Vector3<f64>, frequency_scale: f64) -> ElevationSample {
        let sample_point = unit_position * frequency_scale + self.seed;

        let mut elevation = 0.0;
        let mut gradient = Vector3::zeros();

        let mut continent_mask = 0.0;
        if let Some(continents) = &self.continents {
            let continents = continents.evaluate(&sample_point);
            continent_mask = continents.elevation;
            elevation += continent_mask * self.continent_base_height;
            gradient += continents.gradient * self.continent_base_height;
        }

        // Mountains only rise where there is continental mass
        if let Some(mountains) = &self.mountains {
            let mountains = mountains.evaluate(&sample_point);
            elevation += continent_mask * mountains.elevation * self.max_mountain_height;
            gradient += mountains.gradient * (continent_mask * self.max_mountain_height);
        }

        if let Some(bumps) = &self.bumps {
            let bumps = bumps.evaluate(&sample_point);
            elevation += bumps.elevation * self.max_bump_height;
            gradient += bumps.gradient * self.max_bump_height;
        }

        for crater in self.craters.iter() {
            let (depth, crater_gradient) = crater.evaluate(unit_position);
            elevation += depth;
            gradient += crater_gradient / frequency_scale;
        }

        ElevationSample { elevation, gradient }
    }

    /// Upper bound of the elevation anywhere on the planet. Every layer stays within `[0, 1]`
    /// before scaling and craters only dig.
    pub fn max_elevation(&self) -> f64 {
        self.continent_base_height + self.max_mountain_height + self.max_bump_height
    }

    /// The continent mask alone, in `[0, 1]`. Zero for bodies without continents.
    pub fn continent_mask(&self, unit_position: &Vector3<f64>, frequency_scale: f64) -> f64 {
        self.continents
            .as_ref()
            .map(|continents| continents.evaluate(&(unit_position * frequency_scale + self.seed)).elevation)
            .unwrap_or(0.0)
    }
}

fn continents_layer(terrain: &TerrainSettings) -> FractalLayer {
    FractalLayer {
        shape: NoiseShape::Simplex,
        frequency: 1e-6,
        octaves: 6,
        decay: 1.8,
        lacunarity: 2.1,
        min_value: 1.0 - terrain.continents_fragmentation,
    }
}

fn mountains_layer(terrain: &TerrainSettings) -> FractalLayer {
    FractalLayer {
        shape: NoiseShape::Ridged,
        frequency: terrain.mountains_frequency,
        octaves: 6,
        decay: 1.9,
        lacunarity: 2.0,
        min_value: terrain.mountains_min_value,
    }
}

fn bumps_layer(terrain: &TerrainSettings) -> FractalLayer {
    FractalLayer {
        shape: NoiseShape::Simplex,
        frequency: terrain.bumps_frequency,
        octaves: 3,
        decay: 2.0,
        lacunarity: 2.0,
        min_value: 0.2,
    }
}

/// Normal of the displaced sphere at `unit_position`, built from the outward normal and the
/// tangential part of the elevation gradient.
pub fn surface_normal(unit_position: &Vector3<f64>, gradient: &Vector3<f64>) -> Vector3<f64> {
    let tangential = gradient - unit_position * gradient.dot(unit_position);
    (unit_position - tangential).normalize()
}
