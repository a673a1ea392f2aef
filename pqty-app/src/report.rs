//! 报表的纯文本渲染。

use std::fmt::Write;

use pqty_engine::allocator::QuantityIdState;
use pqty_engine::collector::AggregationTarget;
use pqty_engine::normalize::format_number;
use pqty_engine::pass::QuantityReport;

/// 数量汇总表：编号、数量、管道总长、聚合键。
pub fn render_summary(report: &QuantityReport) -> String {
    let summaries = report.summaries();
    let id_width = summaries
        .iter()
        .map(|summary| summary.formatted.len())
        .max()
        .unwrap_or(0)
        .max("ID".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<id_width$}  {:>5}  {:>10}  KEY", "ID", "COUNT", "LENGTH");
    for summary in &summaries {
        let length = if summary.total_length > 0.0 {
            format_number((summary.total_length * 1000.0).round() / 1000.0)
        } else {
            "-".to_string()
        };
        let _ = writeln!(
            out,
            "{:<id_width$}  {:>5}  {:>10}  {}",
            summary.formatted, summary.count, length, summary.key
        );
    }
    let _ = writeln!(
        out,
        "{} 个对象，{} 个聚合键，本次新增 {} 个，下一个编号 {}",
        report.lines.len(),
        summaries.len(),
        report.new_keys,
        report.next_id
    );
    out
}

/// 已保存的编号表，按编号升序。
pub fn render_state(state: &QuantityIdState) -> String {
    let mut out = String::new();
    for (key, id) in state.entries_by_id() {
        let _ = writeln!(out, "{}  {}", state.format(id), key);
    }
    let _ = writeln!(
        out,
        "共 {} 个聚合键，下一个编号 {}（上限 {}）",
        state.len(),
        state.next(),
        state.max_id()
    );
    out
}

pub fn render_assignments(assignments: &[(AggregationTarget, Option<String>)]) -> String {
    let mut out = String::new();
    for (target, id) in assignments {
        let _ = writeln!(out, "{target}\t{}", id.as_deref().unwrap_or("-"));
    }
    out
}
