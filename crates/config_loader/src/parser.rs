//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, PipelineBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<PipelineBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<PipelineBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DispatchMode, SinkType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.sinks.len(), 1);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Log);
        assert_eq!(bp.dispatch.mode, DispatchMode::Single);
        assert_eq!(bp.dispatch.batch_size, 100);
    }

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
version = "V1"

[dispatch]
mode = "batch"
batch_size = 25
quarantine = "failed.jsonl"

[[sinks]]
name = "events"
sink_type = "http"
[sinks.headers]
"Content-Type" = "application/json"
[sinks.params]
url = "http://localhost:8080/ingest"
method = "POST"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.dispatch.mode, DispatchMode::Batch);
        assert_eq!(bp.dispatch.batch_size, 25);
        assert_eq!(
            bp.dispatch.quarantine.as_deref(),
            Some(std::path::Path::new("failed.jsonl"))
        );
        let sink = bp.sink("events").unwrap();
        assert_eq!(sink.headers["Content-Type"], "application/json");
        assert_eq!(sink.param("method"), Some("POST"));
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "dispatch": { "mode": "single" },
            "sinks": [{
                "name": "out",
                "sink_type": "file",
                "params": { "path": "out.jsonl" }
            }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
    }

    #[test]
    fn test_parse_unknown_sink_type() {
        let content = r#"
[[sinks]]
name = "x"
sink_type = "carrier_pigeon"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
