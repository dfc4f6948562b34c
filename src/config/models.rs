use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for keyweave.
///
/// Deserialized from a JSON configuration file. It captures the tunables the
/// engine needs:
/// - `keys`: logical key name -> concrete key sent to the injector
/// - `mouse`: camera-turn calibration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Logical-to-concrete key bindings. Actions may use either side: a key
    /// name absent from this map passes through to the injector unchanged.
    #[serde(default = "default_key_map")]
    pub keys: KeyMap,

    /// Mouse/camera calibration used by `turn` actions.
    #[serde(default)]
    pub mouse: MouseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keys: default_key_map(),
            mouse: MouseConfig::default(),
        }
    }
}

impl Config {
    /// Resolve a logical key name to the concrete key the injector should
    /// press. Unknown names resolve to themselves.
    pub fn resolve_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.keys.get(key).map_or(key, String::as_str)
    }
}

/// Logical key name -> concrete key.
pub type KeyMap = BTreeMap<String, String>;

/// Default bindings for a typical WASD layout.
pub fn default_key_map() -> KeyMap {
    [
        ("forward", "w"),
        ("backward", "s"),
        ("left", "a"),
        ("right", "d"),
        ("up", "up"),
        ("down", "down"),
        ("sprint", "shift"),
        ("crouch", "c"),
        ("jump", "space"),
        ("walk", "ctrl"),
        ("attack", "v"),
        ("action", "f"),
        ("reload", "r"),
        ("scan", "q"),
        ("carry", "e"),
        ("cargo", "i"),
        ("compass", "g"),
        ("esc", "escape"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Calibration for translating camera-turn degrees into relative mouse motion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MouseConfig {
    /// Horizontal pixels of mouse travel per degree of camera rotation.
    #[serde(default = "MouseConfig::default_pixels_per_degree")]
    pub pixels_per_degree: f64,

    /// Granularity of turn stepping (steps per second of turn duration).
    #[serde(default = "MouseConfig::default_steps_per_second")]
    pub steps_per_second: u32,
}

impl MouseConfig {
    fn default_pixels_per_degree() -> f64 {
        32.5
    }

    fn default_steps_per_second() -> u32 {
        60
    }
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            pixels_per_degree: Self::default_pixels_per_degree(),
            steps_per_second: Self::default_steps_per_second(),
        }
    }
}
