use std::collections::{HashMap, HashSet};

use serde_json::Value as JsonValue;

use super::model::{Datapoint, Displays, Experiment, ValueDef, RESERVED_KEYS};
use crate::color;
use crate::error::ValidationError;

type Result<T> = std::result::Result<T, ValidationError>;

/// Display settings that name a column.
const AXIS_SETTINGS: [(Displays, &str); 3] = [
    (Displays::Xy, "axis_x"),
    (Displays::Xy, "axis_y"),
    (Displays::Distribution, "axis"),
];

impl Datapoint {
    /// Local checks of a single datapoint.
    pub fn validate(&self) -> Result<()> {
        for key in RESERVED_KEYS {
            if self.values.contains_key(key) {
                return Err(ValidationError::ReservedKey {
                    uid: self.uid.clone(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl ValueDef {
    /// Check color strings and colormap name of the `column` definition.
    pub fn validate(&self, column: &str) -> Result<()> {
        if let Some(colors) = &self.colors {
            for (value, c) in colors {
                if !color::is_html_color(c) {
                    return Err(ValidationError::InvalidColor {
                        column: column.to_string(),
                        value: value.clone(),
                        color: c.clone(),
                    });
                }
            }
        }
        if let Some(colormap) = &self.colormap {
            if !color::is_colormap_name(colormap) {
                return Err(ValidationError::InvalidColormap {
                    colormap: colormap.clone(),
                    location: format!("for column {column}"),
                });
            }
        }
        Ok(())
    }
}

impl Experiment {
    /// Make sure this experiment can be rendered.
    ///
    /// Experiments with duplicate uids, circular references, missing
    /// parents, reserved value keys, no datapoint, malformed colors or
    /// colormaps, or display axes naming unknown columns are invalid.
    /// Returns the first violation found; never modifies the experiment.
    pub fn validate(&self) -> Result<&Self> {
        self.validate_lineage()?;
        if self.datapoints.is_empty() {
            return Err(ValidationError::Empty);
        }
        if !color::is_colormap_name(&self.colormap) {
            return Err(ValidationError::InvalidColormap {
                colormap: self.colormap.clone(),
                location: "(experiment default)".to_string(),
            });
        }
        for (column, def) in &self.parameters_definition {
            def.validate(column)?;
        }
        self.validate_axes()?;
        Ok(self)
    }

    /// Walk every `from_uid` chain once. A datapoint is settled when its
    /// whole ancestry has been checked; walks stop at settled datapoints.
    fn validate_lineage(&self) -> Result<()> {
        let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(self.datapoints.len());
        for (i, dp) in self.datapoints.iter().enumerate() {
            if lookup.insert(dp.uid.as_str(), i).is_some() {
                return Err(ValidationError::DuplicateUid(dp.uid.clone()));
            }
        }

        let mut settled = vec![false; self.datapoints.len()];
        let mut walk: HashSet<usize> = HashSet::new();
        for (start, dp) in self.datapoints.iter().enumerate() {
            if !settled[start] {
                walk.clear();
                walk.insert(start);
                let mut current = dp;
                while let Some(parent) = current.from_uid.as_deref() {
                    let Some(&p) = lookup.get(parent) else {
                        return Err(ValidationError::MissingParent {
                            uid: current.uid.clone(),
                            parent: parent.to_string(),
                        });
                    };
                    if settled[p] {
                        break;
                    }
                    if !walk.insert(p) {
                        return Err(ValidationError::CircularReference {
                            uid: dp.uid.clone(),
                            depth: walk.len(),
                        });
                    }
                    current = &self.datapoints[p];
                }
                for &i in &walk {
                    settled[i] = true;
                }
            }
            dp.validate()?;
        }
        Ok(())
    }

    fn validate_axes(&self) -> Result<()> {
        for (display, setting) in AXIS_SETTINGS {
            let column = match self
                .display_data
                .get(display.as_str())
                .and_then(|settings| settings.get(setting))
            {
                Some(JsonValue::String(column)) => column,
                _ => continue,
            };
            if RESERVED_KEYS.contains(&column.as_str()) {
                continue;
            }
            if !self.datapoints.iter().any(|dp| dp.values.contains_key(column)) {
                return Err(ValidationError::DanglingAxis {
                    display: display.to_string(),
                    setting: setting.to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::value::Value;

    fn dp(uid: &str, from_uid: Option<&str>) -> Datapoint {
        Datapoint {
            uid: uid.to_string(),
            from_uid: from_uid.map(str::to_string),
            values: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validation_circular_ref() {
        let xp = Experiment::from_datapoints(vec![
            dp("1", Some("2")),
            dp("2", Some("3")),
            dp("3", Some("4")),
            dp("4", Some("2")),
        ]);
        assert!(matches!(
            xp.validate(),
            Err(ValidationError::CircularReference { .. })
        ));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let xp = Experiment::from_datapoints(vec![dp("1", Some("1"))]);
        assert_eq!(
            xp.validate().unwrap_err(),
            ValidationError::CircularReference {
                uid: "1".into(),
                depth: 1
            }
        );
    }

    #[test]
    fn test_validation_missing_parent() {
        let xp = Experiment::from_datapoints(vec![dp("1", Some("2"))]);
        assert_eq!(
            xp.validate().unwrap_err(),
            ValidationError::MissingParent {
                uid: "1".into(),
                parent: "2".into()
            }
        );
    }

    #[test]
    fn test_long_chain_settles_once() {
        let mut datapoints = vec![dp("0", None)];
        for i in 1..10_000 {
            datapoints.push(dp(&i.to_string(), Some(&(i - 1).to_string())));
        }
        datapoints.reverse();
        let xp = Experiment::from_datapoints(datapoints);
        assert!(xp.validate().is_ok());
    }

    #[test]
    fn test_reserved_key() {
        let mut point = dp("x", None);
        point.values.insert("uid".into(), Value::from("y"));
        assert!(matches!(
            point.validate(),
            Err(ValidationError::ReservedKey { .. })
        ));
        let xp = Experiment::from_datapoints(vec![point]);
        assert!(xp.validate().unwrap_err().is_schema_violation());
    }

    #[test]
    fn test_duplicate_uid() {
        let xp = Experiment::from_datapoints(vec![dp("1", None), dp("1", None)]);
        assert_eq!(
            xp.validate().unwrap_err(),
            ValidationError::DuplicateUid("1".into())
        );
    }

    #[test]
    fn test_empty_experiment() {
        assert_eq!(Experiment::new().validate().unwrap_err(), ValidationError::Empty);
    }

    #[test]
    fn test_colormaps() {
        let mut xp = Experiment::from_datapoints(vec![dp("1", None)]);
        xp.colormap = "schemeAccent#inverse".into();
        assert!(xp.validate().is_ok());
        xp.colormap = "turbo".into();
        assert!(matches!(
            xp.validate(),
            Err(ValidationError::InvalidColormap { .. })
        ));
        xp.colormap = "interpolateTurbo".into();
        xp.parameter("a").colormap = Some("viridis".into());
        assert!(matches!(
            xp.validate(),
            Err(ValidationError::InvalidColormap { .. })
        ));
    }

    #[test]
    fn test_axis_references() {
        let mut point = dp("1", None);
        point.values.insert("time".into(), Value::from(1.0));
        let mut xp = Experiment::from_datapoints(vec![point]);
        xp.display_data(Displays::Xy)
            .insert("axis_x".into(), "time".into());
        xp.display_data(Displays::Xy)
            .insert("axis_y".into(), "uid".into());
        assert!(xp.validate().is_ok());

        xp.display_data(Displays::Distribution)
            .insert("axis".into(), "missing".into());
        assert_eq!(
            xp.validate().unwrap_err(),
            ValidationError::DanglingAxis {
                display: "DISTRIBUTION".into(),
                setting: "axis".into(),
                column: "missing".into()
            }
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let xp = Experiment::from_datapoints(vec![dp("1", None), dp("2", Some("1"))]);
        assert!(xp.validate().is_ok());
        let before = xp.clone();
        assert!(xp.validate().is_ok());
        assert_eq!(xp, before);
    }
}
