//! Template intrinsic functions

use serde_json::{Value as JsonValue, json};

/// `{"Ref": logical_id}`
pub fn reference(logical_id: &str) -> JsonValue {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> JsonValue {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Join": ["", parts]}`
pub fn join(parts: Vec<JsonValue>) -> JsonValue {
    json!({ "Fn::Join": ["", parts] })
}

/// Logical ids referenced anywhere inside `value` through `Ref` or `Fn::GetAtt`
pub fn referenced_ids(value: &JsonValue) -> Vec<String> {
    let mut ids = Vec::new();
    collect_ids(value, &mut ids);
    ids
}

fn collect_ids(value: &JsonValue, ids: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) => {
            if let Some(JsonValue::String(id)) = map.get("Ref") {
                ids.push(id.clone());
            }
            if let Some(JsonValue::String(id)) = map
                .get("Fn::GetAtt")
                .and_then(|att| att.get(0))
            {
                ids.push(id.clone());
            }
            for nested in map.values() {
                collect_ids(nested, ids);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_ids(item, ids);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_ids() {
        let value = json!({
            "Bucket": reference("SiteBucketAB12CD34"),
            "Resource": join(vec![get_att("SiteBucketAB12CD34", "Arn"), json!("/*")]),
            "Principal": { "CanonicalUser": get_att("OAI0000", "S3CanonicalUserId") },
        });

        let mut ids = referenced_ids(&value);
        ids.sort();
        ids.dedup();
        assert_eq!(ids, vec!["OAI0000", "SiteBucketAB12CD34"]);
    }
}
