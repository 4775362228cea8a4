use anyhow::Result;
use chrono::Local;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::tools::ToolSpec;

static SPEC: Lazy<ToolSpec> = Lazy::new(|| {
    ToolSpec::new(
        "get_time",
        "Get time",
        "获取当前本地时间",
        json!({}),
    )
});

pub fn spec() -> ToolSpec {
    SPEC.clone()
}

pub fn execute(_args: &Map<String, Value>) -> Result<Value> {
    let now = Local::now();
    Ok(json!({
        "rfc3339": now.to_rfc3339(),
        "display": now.format("%Y-%m-%d %H:%M:%S").to_string(),
        "weekday": now.format("%A").to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_parseable_timestamp() {
        let value = execute(&Map::new()).unwrap();
        let rfc = value["rfc3339"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(rfc).is_ok());
        assert!(value["display"].as_str().unwrap().len() >= 19);
    }
}
