//! Flat view of nested attributes
//!
//! Lists become `key.#` plus `key.0`, `key.1`, ...; maps become `key.%` plus
//! `key.<name>`; nested blocks flatten recursively (`environment.0.variable.#`).

use std::collections::{BTreeMap, HashMap};

use crate::resource::Value;

pub fn flatten(attributes: &HashMap<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in attributes {
        flatten_value(key, value, &mut out);
    }
    out
}

fn flatten_value(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Int(i) => {
            out.insert(prefix.to_string(), i.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::List(items) => {
            out.insert(format!("{}.#", prefix), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_value(&format!("{}.{}", prefix, i), item, out);
            }
        }
        Value::Map(map) => {
            out.insert(format!("{}.%", prefix), map.len().to_string());
            for (k, v) in map {
                flatten_value(&format!("{}.{}", prefix, k), v, out);
            }
        }
        Value::ResourceRef(_) | Value::Template(_) | Value::Unknown => {
            out.insert(prefix.to_string(), "<unknown>".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_nested_values() {
        let mut tags = HashMap::new();
        tags.insert("owner".to_string(), Value::from("terraform"));

        let mut instance = HashMap::new();
        instance.insert("name".to_string(), Value::from("dds-1"));
        instance.insert("port".to_string(), Value::Int(8635));

        let mut attrs = HashMap::new();
        attrs.insert("tags".to_string(), Value::Map(tags));
        attrs.insert("instances".to_string(), Value::List(vec![Value::Map(instance)]));
        attrs.insert("ssl_enable".to_string(), Value::Bool(false));

        let flat = flatten(&attrs);
        assert_eq!(flat["tags.%"], "1");
        assert_eq!(flat["tags.owner"], "terraform");
        assert_eq!(flat["instances.#"], "1");
        assert_eq!(flat["instances.0.name"], "dds-1");
        assert_eq!(flat["instances.0.port"], "8635");
        assert_eq!(flat["instances.0.%"], "2");
        assert_eq!(flat["ssl_enable"], "false");
    }
}
