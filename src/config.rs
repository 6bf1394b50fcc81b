use crate::{Error, NetworkShape, Result};

/// Everything one generator run depends on.
///
/// Two runs with equal configs produce byte-identical output.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub shape: NetworkShape,
    pub seed: u64,
    /// Name of the emitted C function.
    pub routine_name: String,
    /// Shown in the generated-file marker line.
    pub generator_name: String,
    /// Also emit C definitions of `assert_scalar` / `assert_array`.
    pub emit_assert_primitives: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            shape: NetworkShape::default(),
            seed: 0,
            routine_name: "test_back_propagation".to_owned(),
            generator_name: env!("CARGO_PKG_NAME").to_owned(),
            emit_assert_primitives: false,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        self.shape.validate()?;

        if !is_c_identifier(&self.routine_name) {
            return Err(Error::InvalidConfig(format!(
                "routine_name must be a C identifier, got {:?}",
                self.routine_name
            )));
        }
        if self.generator_name.is_empty() {
            return Err(Error::InvalidConfig(
                "generator_name must not be empty".to_owned(),
            ));
        }
        // The marker is a single-line block comment.
        if self.generator_name.contains(['\n', '\r']) || self.generator_name.contains("*/") {
            return Err(Error::InvalidConfig(format!(
                "generator_name cannot appear in a one-line comment: {:?}",
                self.generator_name
            )));
        }
        Ok(())
    }
}

fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = GeneratorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.shape, NetworkShape::new(2, 3, 4).unwrap());
        assert_eq!(cfg.generator_name, "backprop-oracle");
    }

    #[test]
    fn rejects_bad_routine_names() {
        for name in ["", "1test", "test-backprop", "test back"] {
            let cfg = GeneratorConfig {
                routine_name: name.to_owned(),
                ..GeneratorConfig::default()
            };
            assert!(cfg.validate().is_err(), "{name:?}");
        }
    }

    #[test]
    fn rejects_marker_breaking_generator_names() {
        for name in ["", "a*/b", "two\nlines"] {
            let cfg = GeneratorConfig {
                generator_name: name.to_owned(),
                ..GeneratorConfig::default()
            };
            assert!(cfg.validate().is_err(), "{name:?}");
        }
    }

    #[test]
    fn rejects_zero_shape() {
        let cfg = GeneratorConfig {
            shape: NetworkShape {
                s0: 2,
                s1: 0,
                s2: 4,
            },
            ..GeneratorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }
}
