//! 投递指标模块
//!
//! 指标名称定义在 `contracts::metric_names`，与 dispatcher 上报的计数器共用。

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

pub use contracts::metric_names::*;

/// 注册指标描述
///
/// 在安装 recorder 之后调用一次。
pub fn describe_metrics() {
    describe_counter!(
        RECORDS_DELIVERED_TOTAL,
        Unit::Count,
        "Records delivered by a sink"
    );
    describe_counter!(
        RECORDS_FAILED_TOTAL,
        Unit::Count,
        "Records that produced a failure record"
    );
    describe_counter!(BATCHES_TOTAL, Unit::Count, "Batches handed to output_many");
    describe_counter!(RECORDS_READ_TOTAL, Unit::Count, "Input records read");
    describe_counter!(
        RECORDS_QUARANTINED_TOTAL,
        Unit::Count,
        "Failure records written to the quarantine file"
    );
    describe_histogram!(
        DISPATCH_LATENCY_MS,
        Unit::Milliseconds,
        "Time spent in one handle or output_many call"
    );
}

/// 记录读取的输入记录
pub fn record_records_read(count: usize) {
    counter!(RECORDS_READ_TOTAL).increment(count as u64);
}

/// 记录写入隔离文件的失败记录
pub fn record_quarantined(count: usize) {
    if count > 0 {
        counter!(RECORDS_QUARANTINED_TOTAL).increment(count as u64);
    }
}

/// 记录一次分发耗时
pub fn record_dispatch_latency_ms(sink_name: &str, mode: &'static str, latency_ms: f64) {
    histogram!(
        DISPATCH_LATENCY_MS,
        "sink" => sink_name.to_string(),
        "mode" => mode
    )
    .record(latency_ms);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
