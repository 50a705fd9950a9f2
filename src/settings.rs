//! Persistence of effect controls in a flat integer key-value store.
//!
//! Keys are `<prefix>_<field>` (`B_thresh`, `CA_maxD`, `G_numThreads`, ...)
//! and values are slider ticks. Missing keys load the documented default and
//! out-of-range values are clamped into the slider range.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FxResult;
use crate::params::{
    AberrationControls, AnamorphicFlareControls, BloomControls, EffectParams, GlobalControls,
    LensDirtControls, PseudoFlareControls, THREAD_TICKS, TickRange, aberration, bloom, dirt, flare,
};

/// Integer key-value storage for persisted ticks.
pub trait SettingsStore {
    fn value(&self, key: &str) -> Option<i64>;

    fn set_value(&mut self, key: &str, value: i64);

    fn remove(&mut self, key: &str);
}

/// In-memory store, mostly for tests and embedding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemorySettings {
    values: BTreeMap<String, i64>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStore for MemorySettings {
    fn value(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn set_value(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Store backed by a TOML table on disk. Changes stay in memory until
/// [`FileSettings::save`].
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: BTreeMap<String, i64>,
}

impl FileSettings {
    /// Returns the user settings file path, if a config directory is available.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lensfx").join("settings.toml"))
    }

    /// Reads `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> FxResult<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), keys = values.len(), "loaded settings");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> FxResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(&self.values)?)?;
        debug!(path = %self.path.display(), keys = self.values.len(), "saved settings");
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn value(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn set_value(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Controls that can be written to and read back from a [`SettingsStore`].
pub trait PersistedParams: Sized {
    /// Key prefix, without the trailing underscore.
    const PREFIX: &'static str;

    fn save(&self, store: &mut dyn SettingsStore);

    fn load(store: &dyn SettingsStore) -> Self;
}

/// Loads an effect's controls and converts them to model units.
pub fn load_params<P>(store: &dyn SettingsStore) -> P
where
    P: EffectParams,
    P::Controls: PersistedParams,
{
    P::from_controls(&P::Controls::load(store))
}

pub fn save_params<P>(params: &P, store: &mut dyn SettingsStore)
where
    P: EffectParams,
    P::Controls: PersistedParams,
{
    params.controls().save(store);
}

fn key(prefix: &str, field: &str) -> String {
    format!("{prefix}_{field}")
}

struct Writer<'s> {
    prefix: &'static str,
    store: &'s mut dyn SettingsStore,
}

impl Writer<'_> {
    fn put(&mut self, field: &str, value: i64) -> &mut Self {
        self.store.set_value(&key(self.prefix, field), value);
        self
    }

    /// Unset thread overrides are removed so the global count applies.
    fn threads(&mut self, value: Option<i64>) -> &mut Self {
        let k = key(self.prefix, "numThreads");
        match value {
            Some(v) => self.store.set_value(&k, v),
            None => self.store.remove(&k),
        }
        self
    }
}

struct Reader<'s> {
    prefix: &'static str,
    store: &'s dyn SettingsStore,
}

impl Reader<'_> {
    fn tick(&self, field: &str, range: TickRange) -> i64 {
        self.store
            .value(&key(self.prefix, field))
            .map_or(range.default, |v| range.clamp(v))
    }

    fn threads(&self) -> Option<i64> {
        self.store
            .value(&key(self.prefix, "numThreads"))
            .map(|v| THREAD_TICKS.clamp(v))
    }
}

impl PersistedParams for BloomControls {
    const PREFIX: &'static str = "B";

    fn save(&self, store: &mut dyn SettingsStore) {
        Writer {
            prefix: Self::PREFIX,
            store,
        }
        .put("thresh", self.thresh)
        .put("blurStrength", self.blur_strength)
        .put("power", self.power)
        .threads(self.num_threads);
    }

    fn load(store: &dyn SettingsStore) -> Self {
        let r = Reader {
            prefix: Self::PREFIX,
            store,
        };
        Self {
            thresh: r.tick("thresh", bloom::THRESH),
            blur_strength: r.tick("blurStrength", bloom::BLUR_STRENGTH),
            power: r.tick("power", bloom::POWER),
            num_threads: r.threads(),
        }
    }
}

impl PersistedParams for AberrationControls {
    const PREFIX: &'static str = "CA";

    fn save(&self, store: &mut dyn SettingsStore) {
        Writer {
            prefix: Self::PREFIX,
            store,
        }
        .put("maxD", self.max_d)
        .put("deadZ", self.dead_z)
        .put("isShapeRadial", self.is_shape_radial)
        .put("isFalloffExp", self.is_falloff_exp)
        .put("direction", self.direction)
        .put("interpolate", self.interpolate)
        .threads(self.num_threads);
    }

    fn load(store: &dyn SettingsStore) -> Self {
        let r = Reader {
            prefix: Self::PREFIX,
            store,
        };
        Self {
            max_d: r.tick("maxD", aberration::MAX_DISPLACEMENT),
            dead_z: r.tick("deadZ", aberration::DEAD_ZONE),
            is_shape_radial: r.tick("isShapeRadial", aberration::TOGGLE),
            is_falloff_exp: r.tick("isFalloffExp", aberration::TOGGLE),
            direction: r.tick("direction", aberration::DIRECTION),
            interpolate: r.tick("interpolate", aberration::INTERPOLATE),
            num_threads: r.threads(),
        }
    }
}

impl PersistedParams for AnamorphicFlareControls {
    const PREFIX: &'static str = "AF";

    fn save(&self, store: &mut dyn SettingsStore) {
        Writer {
            prefix: Self::PREFIX,
            store,
        }
        .put("thresh", self.thresh)
        .put("blurStrength", self.blur_strength)
        .put("isHorizontal", self.is_horizontal)
        .put("power", self.power)
        .threads(self.num_threads);
    }

    fn load(store: &dyn SettingsStore) -> Self {
        let r = Reader {
            prefix: Self::PREFIX,
            store,
        };
        Self {
            thresh: r.tick("thresh", flare::AF_THRESH),
            blur_strength: r.tick("blurStrength", flare::AF_BLUR_STRENGTH),
            is_horizontal: r.tick("isHorizontal", flare::AF_HORIZONTAL),
            power: r.tick("power", flare::AF_POWER),
            num_threads: r.threads(),
        }
    }
}

impl PersistedParams for PseudoFlareControls {
    const PREFIX: &'static str = "PF";

    fn save(&self, store: &mut dyn SettingsStore) {
        Writer {
            prefix: Self::PREFIX,
            store,
        }
        .put("thresh", self.thresh)
        .put("artifactCopies", self.artifact_copies)
        .put("artifactDispersal", self.artifact_dispersal)
        .put("haloWidth", self.halo_width)
        .put("blurStrength", self.blur_strength)
        .put("aberrationStrength", self.aberration_strength)
        .put("power", self.power)
        .put("interpolate", self.interpolate)
        .threads(self.num_threads);
    }

    fn load(store: &dyn SettingsStore) -> Self {
        let r = Reader {
            prefix: Self::PREFIX,
            store,
        };
        Self {
            thresh: r.tick("thresh", flare::PF_THRESH),
            artifact_copies: r.tick("artifactCopies", flare::PF_ARTIFACT_COPIES),
            artifact_dispersal: r.tick("artifactDispersal", flare::PF_ARTIFACT_DISPERSAL),
            halo_width: r.tick("haloWidth", flare::PF_HALO_WIDTH),
            blur_strength: r.tick("blurStrength", flare::PF_BLUR_STRENGTH),
            aberration_strength: r.tick("aberrationStrength", flare::PF_ABERRATION_STRENGTH),
            power: r.tick("power", flare::PF_POWER),
            interpolate: r.tick("interpolate", flare::PF_INTERPOLATE),
            num_threads: r.threads(),
        }
    }
}

impl PersistedParams for LensDirtControls {
    const PREFIX: &'static str = "LD";

    fn save(&self, store: &mut dyn SettingsStore) {
        Writer {
            prefix: Self::PREFIX,
            store,
        }
        .put("numShapes", self.num_shapes)
        .put("maxSize", self.max_size)
        .put("sizeVar", self.size_var)
        .put("maxOpacity", self.max_opacity)
        .put("opacityVar", self.opacity_var)
        .put("shape", self.shape)
        .put("direction", self.direction)
        .put("angle", self.angle)
        .put("blurSize", self.blur_size)
        .threads(self.num_threads);
    }

    fn load(store: &dyn SettingsStore) -> Self {
        let r = Reader {
            prefix: Self::PREFIX,
            store,
        };
        Self {
            num_shapes: r.tick("numShapes", dirt::NUM_SHAPES),
            max_size: r.tick("maxSize", dirt::MAX_SIZE),
            size_var: r.tick("sizeVar", dirt::SIZE_VAR),
            max_opacity: r.tick("maxOpacity", dirt::MAX_OPACITY),
            opacity_var: r.tick("opacityVar", dirt::OPACITY_VAR),
            shape: r.tick("shape", dirt::SHAPE),
            direction: r.tick("direction", dirt::DIRECTION),
            angle: r.tick("angle", dirt::ANGLE),
            blur_size: r.tick("blurSize", dirt::BLUR_SIZE),
            num_threads: r.threads(),
        }
    }
}

impl PersistedParams for GlobalControls {
    const PREFIX: &'static str = "G";

    fn save(&self, store: &mut dyn SettingsStore) {
        Writer {
            prefix: Self::PREFIX,
            store,
        }
        .threads(self.num_threads);
    }

    fn load(store: &dyn SettingsStore) -> Self {
        let r = Reader {
            prefix: Self::PREFIX,
            store,
        };
        Self {
            num_threads: r.threads(),
        }
    }
}
