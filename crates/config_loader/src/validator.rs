//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个 sink，sink name 非空且唯一
//! - 各 sink 类型的必填参数齐全
//! - dispatch.batch_size > 0
//! - http: timeout_ms 为数字，method / fail_on 可识别
//! - csv: delimiter 为单个 ASCII 字符

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint, SinkConfig, SinkType};

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"];

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_dispatch(blueprint)?;
    validate_sink_names(blueprint)?;
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        validate_required_params(idx, sink)?;
        match sink.sink_type {
            SinkType::Http => validate_http(idx, sink)?,
            SinkType::Csv => validate_csv(idx, sink)?,
            SinkType::Queue
            | SinkType::File
            | SinkType::Console
            | SinkType::Log
            | SinkType::Null => {}
        }
    }
    Ok(())
}

/// 校验分发配置
fn validate_dispatch(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.dispatch.batch_size == 0 {
        return Err(ContractError::config_validation(
            "dispatch.batch_size",
            "batch_size must be > 0",
        ));
    }
    Ok(())
}

/// 校验 sink name 非空且唯一
fn validate_sink_names(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.sinks.is_empty() {
        return Err(ContractError::config_validation(
            "sinks",
            "at least one sink must be defined",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

/// 校验必填参数
fn validate_required_params(idx: usize, sink: &SinkConfig) -> Result<(), ContractError> {
    for key in sink.sink_type.required_params() {
        let present = sink.param(key).is_some_and(|v| !v.trim().is_empty());
        if !present {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].params.{key}"),
                format!("'{key}' is required for {} sinks", sink.sink_type),
            ));
        }
    }
    Ok(())
}

/// 校验 http sink 参数
fn validate_http(idx: usize, sink: &SinkConfig) -> Result<(), ContractError> {
    if let Some(timeout_ms) = sink.param("timeout_ms") {
        if timeout_ms.trim().parse::<u64>().is_err() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].params.timeout_ms"),
                format!("timeout_ms must be a whole number of milliseconds, got '{timeout_ms}'"),
            ));
        }
    }

    if let Some(method) = sink.param("method") {
        let upper = method.trim().to_uppercase();
        if !HTTP_METHODS.contains(&upper.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].params.method"),
                format!("unsupported method '{method}'"),
            ));
        }
    }

    if let Some(fail_on) = sink.param("fail_on") {
        if !is_fail_on(fail_on) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].params.fail_on"),
                format!(
                    "expected 'error_status', 'empty_body' or 'status:<codes>', got '{fail_on}'"
                ),
            ));
        }
    }
    Ok(())
}

fn is_fail_on(value: &str) -> bool {
    match value.trim() {
        "error_status" | "empty_body" => true,
        other => other.strip_prefix("status:").is_some_and(|codes| {
            !codes.trim().is_empty()
                && codes
                    .split(',')
                    .all(|code| code.trim().parse::<u16>().is_ok())
        }),
    }
}

/// 校验 csv sink 参数
fn validate_csv(idx: usize, sink: &SinkConfig) -> Result<(), ContractError> {
    let Some(delimiter) = sink.param("delimiter") else {
        return Ok(());
    };
    let valid = matches!(delimiter, "\\t" | "tab")
        || (delimiter.len() == 1 && delimiter.is_ascii());
    if !valid {
        return Err(ContractError::config_validation(
            format!("sinks[{idx}].params.delimiter"),
            format!("delimiter must be a single ASCII character, got '{delimiter}'"),
        ));
    }
    Ok(())
}
