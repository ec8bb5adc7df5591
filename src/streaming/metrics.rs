//! 流式传输指标类型
//!
//! 单个翻译请求在代理中的统计数据，流结束时汇总写入一条日志。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 流的结束方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum StreamOutcome {
    /// 仍在进行
    Pending,
    /// 写出了结束标记
    Completed,
    /// 写出了错误标记，附带错误类型
    Failed(String),
    /// 客户端断开，未写出任何标记
    Cancelled,
}

impl StreamOutcome {
    /// 获取结果名称
    pub fn as_str(&self) -> &str {
        match self {
            StreamOutcome::Pending => "pending",
            StreamOutcome::Completed => "completed",
            StreamOutcome::Failed(_) => "failed",
            StreamOutcome::Cancelled => "cancelled",
        }
    }
}

/// 流式传输指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMetrics {
    /// 首字节时间（毫秒）
    ///
    /// 从上游请求发出到收到第一个响应 chunk 的时间。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb_ms: Option<u64>,

    /// 上游 chunk 数量
    pub chunk_count: u32,

    /// 上游总字节数
    pub total_bytes: usize,

    /// 切分出的 SSE 记录数量
    pub record_count: u32,

    /// 发出的 Token 数量
    pub token_count: u32,

    /// 解析器丢弃的片段数量
    pub dropped_fragment_count: u32,

    /// 开始时间
    pub start_time: DateTime<Utc>,

    /// 结束时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// 首个 chunk 时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_chunk_time: Option<DateTime<Utc>>,

    /// 最小 chunk 大小（字节）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_chunk_size: Option<usize>,

    /// 最大 chunk 大小（字节）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chunk_size: Option<usize>,

    /// 结束方式
    pub outcome: StreamOutcome,
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self {
            ttfb_ms: None,
            chunk_count: 0,
            total_bytes: 0,
            record_count: 0,
            token_count: 0,
            dropped_fragment_count: 0,
            start_time: Utc::now(),
            end_time: None,
            first_chunk_time: None,
            min_chunk_size: None,
            max_chunk_size: None,
            outcome: StreamOutcome::Pending,
        }
    }
}

impl StreamMetrics {
    /// 创建新的指标实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录收到一个上游 chunk
    ///
    /// 第一个 chunk 同时确定 TTFB。
    pub fn record_chunk(&mut self, bytes: usize) {
        let now = Utc::now();
        self.chunk_count += 1;
        self.total_bytes += bytes;

        self.min_chunk_size = Some(self.min_chunk_size.map_or(bytes, |min| min.min(bytes)));
        self.max_chunk_size = Some(self.max_chunk_size.map_or(bytes, |max| max.max(bytes)));

        if self.first_chunk_time.is_none() {
            self.first_chunk_time = Some(now);
            self.ttfb_ms = Some((now - self.start_time).num_milliseconds().max(0) as u64);
        }
    }

    /// 记录切分出的 SSE 记录
    pub fn record_records(&mut self, count: usize) {
        self.record_count += count as u32;
    }

    /// 记录发出的 Token
    pub fn record_tokens(&mut self, count: usize) {
        self.token_count += count as u32;
    }

    /// 同步解析器丢弃的片段数量
    pub fn set_dropped_fragments(&mut self, count: u32) {
        self.dropped_fragment_count = count;
    }

    /// 以给定结果结束
    ///
    /// 只有第一次调用生效。
    pub fn finish(&mut self, outcome: StreamOutcome) {
        if self.end_time.is_some() {
            return;
        }
        self.end_time = Some(Utc::now());
        self.outcome = outcome;
    }

    /// 获取总耗时（毫秒）
    ///
    /// 未结束时返回从开始到现在的时间。
    pub fn duration_ms(&self) -> u64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds().max(0) as u64
    }

    /// 获取平均 chunk 大小（字节）
    pub fn avg_chunk_size(&self) -> Option<f64> {
        if self.chunk_count == 0 {
            return None;
        }
        Some(self.total_bytes as f64 / self.chunk_count as f64)
    }

    /// 获取吞吐量（字节/秒）
    pub fn throughput_bytes_per_sec(&self) -> Option<f64> {
        let duration_ms = self.duration_ms();
        if duration_ms == 0 {
            return None;
        }
        Some(self.total_bytes as f64 / (duration_ms as f64 / 1000.0))
    }

    /// 转换为摘要字符串
    pub fn summary(&self) -> String {
        let ttfb = self
            .ttfb_ms
            .map(|t| format!("{}ms", t))
            .unwrap_or_else(|| "N/A".to_string());
        let avg_chunk = self
            .avg_chunk_size()
            .map(|s| format!("{:.0}B", s))
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "outcome: {}, chunks: {}, bytes: {}, records: {}, tokens: {}, dropped: {}, duration: {}ms, ttfb: {}, avg_chunk: {}",
            self.outcome.as_str(),
            self.chunk_count,
            self.total_bytes,
            self.record_count,
            self.token_count,
            self.dropped_fragment_count,
            self.duration_ms(),
            ttfb,
            avg_chunk,
        )
    }

    /// 记录详细指标到日志
    pub fn log_metrics(&self, request_id: &str) {
        let throughput = self.throughput_bytes_per_sec().unwrap_or(0.0);
        let failure_reason = match &self.outcome {
            StreamOutcome::Failed(reason) => Some(reason.as_str()),
            _ => None,
        };

        info!(
            request_id = request_id,
            outcome = self.outcome.as_str(),
            failure_reason = ?failure_reason,
            chunk_count = self.chunk_count,
            total_bytes = self.total_bytes,
            record_count = self.record_count,
            token_count = self.token_count,
            dropped_fragment_count = self.dropped_fragment_count,
            duration_ms = self.duration_ms(),
            ttfb_ms = ?self.ttfb_ms,
            throughput_kbps = format!("{:.2}", throughput / 1024.0),
            min_chunk_size = ?self.min_chunk_size,
            max_chunk_size = ?self.max_chunk_size,
            "[STREAM] 流式传输指标"
        );
    }
}

// ============================================================================
// 测试模块
// ============================================================================
