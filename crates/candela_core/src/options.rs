use std::collections::HashMap;

/// A parameter value held by [`Options`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

/// Flat, string-keyed bag of rendering parameters.
///
/// Consumers read values through the typed getters, supplying their own
/// defaults. Unknown keys are simply never read; a key of the wrong type is
/// reported and the default used instead. Range clamping happens at the
/// read sites, where the valid range is known.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: HashMap<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i32) {
        self.set(key, Value::Int(value));
    }

    pub fn set_float(&mut self, key: impl Into<String>, value: f32) {
        self.set(key, Value::Float(value));
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, Value::Bool(value));
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Value::Str(value.into()));
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        match self.values.get(key) {
            Some(Value::Int(v)) => *v,
            Some(other) => {
                log::warn!("option \"{key}\" is not an int ({other:?}) - using {default}");
                default
            }
            None => default,
        }
    }

    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        match self.values.get(key) {
            Some(Value::Float(v)) => *v,
            Some(Value::Int(v)) => *v as f32,
            Some(other) => {
                log::warn!("option \"{key}\" is not a float ({other:?}) - using {default}");
                default
            }
            None => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(Value::Bool(v)) => *v,
            Some(other) => {
                log::warn!("option \"{key}\" is not a bool ({other:?}) - using {default}");
                default
            }
            None => default,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::Str(v)) => Some(v.as_str()),
            Some(other) => {
                log::warn!("option \"{key}\" is not a string ({other:?}) - ignoring");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_keys() {
        let options = Options::new();
        assert_eq!(options.get_int("threads", 0), 0);
        assert_eq!(options.get_float("shutter.open", 0.25), 0.25);
        assert!(options.get_bool("caustics.enabled", true));
        assert!(options.get_str("accel").is_none());
    }

    #[test]
    fn test_typed_round_trip() {
        let mut options = Options::new();
        options.set_int("resolutionX", 1024);
        options.set_bool("baking.viewdep", true);
        options.set_str("accel", "kdtree");
        assert_eq!(options.get_int("resolutionX", 640), 1024);
        assert!(options.get_bool("baking.viewdep", false));
        assert_eq!(options.get_str("accel"), Some("kdtree"));
    }

    #[test]
    fn test_type_mismatch_falls_back() {
        let mut options = Options::new();
        options.set_str("threads", "many");
        assert_eq!(options.get_int("threads", 2), 2);
    }

    #[test]
    fn test_int_promotes_to_float() {
        let mut options = Options::new();
        options.set_int("eta", 2);
        assert_eq!(options.get_float("eta", 0.0), 2.0);
    }
}
