//! Serde adapters shared across the workspace.

/// `Duration` as integer milliseconds.
pub mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// `BTreeMap<Coord, V>` as a list of `[coord, value]` pairs, since JSON
/// object keys must be strings.
pub mod coord_map {
    use crate::Coord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<V, S>(map: &BTreeMap<Coord, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<BTreeMap<Coord, V>, D::Error>
    where
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(Coord, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::Coord;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super::coord_map")]
        map: BTreeMap<Coord, u32>,
        #[serde(with = "super::duration_millis")]
        budget: Duration,
    }

    #[test]
    fn test_coord_map_json_shape() {
        let mut map = BTreeMap::new();
        map.insert(Coord::new(1, 2), 7);
        let w = Wrapper {
            map,
            budget: Duration::from_millis(1500),
        };
        let text = serde_json::to_string(&w).unwrap();
        assert_eq!(text, r#"{"map":[[{"col":1,"row":2},7]],"budget":1500}"#);
        let back: Wrapper = serde_json::from_str(&text).unwrap();
        assert_eq!(back, w);
    }
}
