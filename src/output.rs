use anyhow::{Context, Result};
use chrono::Local;
use console::style;
use csv::Writer;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use crate::solver::{ConflictReport, SolveOutcome};
use crate::types::*;

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Html,
    All,
}

/// One evaluated board, as handed to the report writers
#[derive(Debug, Serialize)]
pub struct BoardReport<'a> {
    pub board: &'a ExchangeBoard,
    pub result: &'a EvaluationResult,
}

/// Report generator for evaluation results
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Print and/or write the report. Returns the files written.
    pub fn generate(&self, report: &BoardReport, format: ReportFormat) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        if matches!(format, ReportFormat::Text | ReportFormat::All) {
            println!("{}", render_text(report));
        }
        if matches!(format, ReportFormat::Json | ReportFormat::All) {
            written.push(self.generate_json_report(report)?);
        }
        if matches!(format, ReportFormat::Csv | ReportFormat::All) {
            written.extend(self.generate_csv_report(report.result)?);
        }
        if matches!(format, ReportFormat::Html | ReportFormat::All) {
            written.push(self.generate_html_report(report)?);
        }

        Ok(written)
    }

    fn ensure_output_dir(&self) -> Result<()> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir).with_context(|| {
                format!(
                    "Failed to create output directory {}",
                    self.output_dir.display()
                )
            })?;
        }
        Ok(())
    }

    fn report_path(&self, stem: &str, extension: &str) -> PathBuf {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        self.output_dir
            .join(format!("{}_{}.{}", stem, timestamp, extension))
    }

    fn generate_json_report(&self, report: &BoardReport) -> Result<PathBuf> {
        self.ensure_output_dir()?;
        let filename = self.report_path("evaluation", "json");

        let json_content =
            to_string_pretty(report).with_context(|| "Failed to serialize results to JSON")?;
        fs::write(&filename, json_content)
            .with_context(|| format!("Failed to write JSON report to {}", filename.display()))?;

        Ok(filename)
    }

    fn generate_csv_report(&self, result: &EvaluationResult) -> Result<Vec<PathBuf>> {
        self.ensure_output_dir()?;
        Ok(vec![
            self.generate_diagnostics_csv(&result.diagnostics)?,
            self.generate_edges_csv(&result.edges)?,
        ])
    }

    fn generate_diagnostics_csv(&self, diagnostics: &[Diagnostic]) -> Result<PathBuf> {
        let filename = self.report_path("diagnostics", "csv");
        let mut wtr = Writer::from_path(&filename)
            .with_context(|| format!("Failed to create CSV writer for {}", filename.display()))?;

        wtr.write_record([
            "kind",
            "donor_pair",
            "recipient_pair",
            "donor",
            "recipient",
            "message",
        ])?;

        for diagnostic in diagnostics {
            let donor_pair = diagnostic.donor_pair.to_string();
            let recipient_pair = diagnostic.recipient_pair.to_string();
            wtr.write_record([
                diagnostic.kind.tag(),
                donor_pair.as_str(),
                recipient_pair.as_str(),
                diagnostic.donor.as_str(),
                diagnostic.recipient.as_str(),
                diagnostic.message.as_str(),
            ])?;
        }

        wtr.flush()?;
        Ok(filename)
    }

    fn generate_edges_csv(&self, edges: &[EdgeOutcome]) -> Result<PathBuf> {
        let filename = self.report_path("edges", "csv");
        let mut wtr = Writer::from_path(&filename)
            .with_context(|| format!("Failed to create CSV writer for {}", filename.display()))?;

        wtr.write_record(["edge", "from_pair", "to_pair", "donor", "recipient", "passed"])?;

        for edge in edges {
            let from = edge.edge.to_string();
            let to = edge.to_pair.to_string();
            wtr.write_record([
                from.as_str(),
                from.as_str(),
                to.as_str(),
                edge.donor.as_str(),
                edge.recipient.as_str(),
                if edge.passed { "true" } else { "false" },
            ])?;
        }

        wtr.flush()?;
        Ok(filename)
    }

    fn generate_html_report(&self, report: &BoardReport) -> Result<PathBuf> {
        self.ensure_output_dir()?;
        let filename = self.report_path("exchange", "html");

        fs::write(&filename, create_html_content(report))
            .with_context(|| format!("Failed to write HTML report to {}", filename.display()))?;

        Ok(filename)
    }
}

/// Terminal rendering: edge indicators, diagnostics, then the banner
pub fn render_text(report: &BoardReport) -> String {
    let mut out = String::new();
    let pairs = report.board.pairs();

    out.push_str(&format!(
        "{} ({})\n",
        style("Exchange cycle").bold().cyan(),
        report.result.rule
    ));
    for (i, pair) in pairs.iter().enumerate() {
        out.push_str(&format!(
            "  Pair {}: Donor {} / Recipient {}\n",
            i + 1,
            style(pair.donor).yellow(),
            style(pair.recipient).yellow()
        ));
    }

    out.push('\n');
    for edge in &report.result.edges {
        let mark = if edge.passed {
            style("✓").green()
        } else {
            style("✗").red()
        };
        out.push_str(&format!(
            "  {} Donor {} ({}) → Recipient {} ({})\n",
            mark, edge.edge, edge.donor, edge.to_pair, edge.recipient
        ));
    }

    if !report.result.diagnostics.is_empty() {
        out.push('\n');
        for diagnostic in &report.result.diagnostics {
            out.push_str(&format!(
                "  [{}] {}\n",
                style(diagnostic.kind.tag()).dim(),
                diagnostic.message
            ));
        }
    }

    out.push('\n');
    if report.result.feasible {
        out.push_str(&format!("{}", style("Model is feasible.").green().bold()));
    } else {
        out.push_str(&format!("{}", style("Model is infeasible.").red().bold()));
    }
    out
}

pub fn render_solve_text(outcome: &SolveOutcome) -> String {
    let mut out = format!(
        "{} {} pairs, {:?} domain, {}\n  Examined {} assignments, {} feasible\n",
        style("Assignment search:").bold().cyan(),
        outcome.pairs,
        outcome.domain,
        outcome.rule,
        outcome.examined,
        outcome.feasible_count
    );

    match &outcome.witness {
        Some(pairs) => {
            out.push_str(&format!("\n{}\n", style("Model is feasible.").green().bold()));
            for (i, pair) in pairs.iter().enumerate() {
                out.push_str(&format!(
                    "  Pair {}: Recipient {} ← Donor {}\n",
                    i + 1,
                    pair.recipient,
                    pair.donor
                ));
            }
        }
        None => {
            let banner = if outcome.pairs % 2 == 1 {
                format!(
                    "Model is infeasible (no {}-cycle assignment exists).",
                    outcome.pairs
                )
            } else {
                "Model is infeasible.".to_string()
            };
            out.push_str(&format!("\n{}\n", style(banner).red().bold()));
            if let Some(conflicts) = &outcome.conflicts {
                out.push_str(&render_conflicts(conflicts));
            }
        }
    }
    out
}

fn render_conflicts(conflicts: &ConflictReport) -> String {
    let mut out = format!(
        "  Same-pair rule alone admits {} assignments\n  Cycle edges alone admit {} assignments\n",
        conflicts.same_pair_satisfiable, conflicts.cycle_satisfiable
    );
    for (i, rejected) in conflicts.edge_rejections.iter().enumerate() {
        out.push_str(&format!(
            "  Edge {} breaks {} same-pair-valid assignments\n",
            i + 1,
            rejected
        ));
    }
    if let Some(closest) = &conflicts.closest {
        let pairs: Vec<String> = closest.pairs.iter().map(|p| p.to_string()).collect();
        let edges: Vec<String> = closest.broken_edges.iter().map(|e| e.to_string()).collect();
        out.push_str(&format!(
            "  Closest: {} (breaks edge {})\n",
            pairs.join(", "),
            edges.join(", ")
        ));
    }
    out
}

pub fn render_solve_json(outcome: &SolveOutcome) -> Result<String> {
    to_string_pretty(outcome).with_context(|| "Failed to serialize solver outcome to JSON")
}

pub fn render_table(table: &CompatibilityTable) -> String {
    let mut out = format!("{}\n", style("ABO compatibility (donor → recipients)").bold().cyan());
    for donor in BloodType::ALL {
        let recipients: Vec<&str> = table
            .recipients_of(donor)
            .iter()
            .map(|r| r.as_str())
            .collect();
        out.push_str(&format!(
            "  {:>2} → {}\n",
            style(donor).green().bold(),
            recipients.join(", ")
        ));
    }
    out
}

fn create_html_content(report: &BoardReport) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let (banner_class, banner) = if report.result.feasible {
        ("feasible", "✅ Model is feasible.")
    } else {
        ("infeasible", "❌ Model is infeasible.")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Kidney Exchange Cycle</title>
    <style>
        body {{
            font-family: Arial, sans-serif;
            margin: 40px;
            background-color: #f5f5f5;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background-color: white;
            padding: 30px;
            border-radius: 10px;
            box-shadow: 0 0 10px rgba(0,0,0,0.1);
        }}
        table {{
            border-collapse: collapse;
            margin: 20px 0;
        }}
        th, td {{
            border: 1px solid #ddd;
            padding: 8px 16px;
        }}
        th {{
            background-color: #3498db;
            color: white;
        }}
        .feasible {{ color: green; }}
        .infeasible {{ color: red; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Kidney Exchange Cycle</h1>
    <p>Generated: {}. Same-pair rule: {}.</p>
    {}
    {}
    {}
    <p class="{}"><strong>{}</strong></p>
</div>
</body>
</html>"#,
        timestamp,
        report.result.rule,
        pairs_html(report.board),
        cycle_svg(report.board, &report.result.edges),
        diagnostics_html(&report.result.diagnostics),
        banner_class,
        banner
    )
}

fn pairs_html(board: &ExchangeBoard) -> String {
    let mut html =
        "<table>\n<tr><th>Pair</th><th>Donor</th><th>Recipient</th></tr>\n".to_string();
    for (i, pair) in board.pairs().iter().enumerate() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            i + 1,
            pair.donor,
            pair.recipient
        ));
    }
    html.push_str("</table>\n");
    html
}

fn diagnostics_html(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::new();
    }
    let mut html = "<ul>\n".to_string();
    for diagnostic in diagnostics {
        let icon = if diagnostic.kind.is_same_pair() { "❌" } else { "⚠️" };
        html.push_str(&format!(
            "<li data-kind=\"{}\">{} {}</li>\n",
            diagnostic.kind.tag(),
            icon,
            diagnostic.message
        ));
    }
    html.push_str("</ul>\n");
    html
}

/// Pairs on a circle with one arrow per edge, green if it passed
fn cycle_svg(board: &ExchangeBoard, edges: &[EdgeOutcome]) -> String {
    const SIZE: f64 = 320.0;
    const RADIUS: f64 = 110.0;
    const NODE: f64 = 30.0;
    const BEND: f64 = 40.0;

    let n = board.len();
    let center = SIZE / 2.0;
    let position = |index: usize| {
        let angle = -PI / 2.0 + 2.0 * PI * (index - 1) as f64 / n as f64;
        (center + RADIUS * angle.cos(), center + RADIUS * angle.sin())
    };

    let mut svg = format!(
        r#"<svg width="{size}" height="{size}" viewBox="0 0 {size} {size}" xmlns="http://www.w3.org/2000/svg">
<defs>
<marker id="head-green" markerWidth="10" markerHeight="7" refX="10" refY="3.5" orient="auto"><polygon points="0 0, 10 3.5, 0 7" fill="green"/></marker>
<marker id="head-red" markerWidth="10" markerHeight="7" refX="10" refY="3.5" orient="auto"><polygon points="0 0, 10 3.5, 0 7" fill="red"/></marker>
</defs>
"#,
        size = SIZE
    );

    for edge in edges {
        let color = if edge.passed { "green" } else { "red" };
        let (x1, y1) = position(edge.edge);
        if edge.edge == edge.to_pair {
            svg.push_str(&format!(
                "<circle id=\"line{}\" cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"3\"/>\n",
                edge.edge,
                x1,
                y1 - NODE,
                NODE / 1.5,
                color
            ));
            continue;
        }
        let (x2, y2) = position(edge.to_pair);
        let (dx, dy) = (x2 - x1, y2 - y1);
        let length = (dx * dx + dy * dy).sqrt();
        let (ux, uy) = (dx / length, dy / length);
        let (sx, sy) = (x1 + ux * NODE, y1 + uy * NODE);
        let (ex, ey) = (x2 - ux * NODE, y2 - uy * NODE);
        if n == 2 {
            // 1->2 and 2->1 share endpoints; bend each to its own left side.
            let (cx, cy) = ((sx + ex) / 2.0 - uy * BEND, (sy + ey) / 2.0 + ux * BEND);
            svg.push_str(&format!(
                "<path id=\"line{}\" d=\"M {:.1} {:.1} Q {:.1} {:.1} {:.1} {:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"3\" marker-end=\"url(#head-{})\"/>\n",
                edge.edge, sx, sy, cx, cy, ex, ey, color, color
            ));
            continue;
        }
        svg.push_str(&format!(
            "<line id=\"line{}\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"3\" marker-end=\"url(#head-{})\"/>\n",
            edge.edge, sx, sy, ex, ey, color, color
        ));
    }

    for (i, pair) in board.pairs().iter().enumerate() {
        let (x, y) = position(i + 1);
        svg.push_str(&format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{}\" fill=\"#e8f4f8\" stroke=\"#3498db\"/>\n<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"11\">P{} {}→{}</text>\n",
            x,
            y,
            NODE,
            x,
            y + 4.0,
            i + 1,
            pair.donor,
            pair.recipient
        ));
    }

    svg.push_str("</svg>\n");
    svg
}
