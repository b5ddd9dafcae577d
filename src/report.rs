use crate::errors::*;
use crate::fix::Summary;
use crate::version::{Package, PackageName};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use strum::{Display, EnumString, EnumVariantNames};

/// Log target of the records written by [`JsonReporter`].
pub const REPORT_TARGET: &str = "nancy_fixer::report";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Section {
        title: String,
    },
    RootParents {
        package: PackageName,
        parents: Vec<Package>,
    },
    Summary {
        summary: Summary,
    },
}

/// Receives progress events of a run. The engine never formats them itself.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &Event);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumVariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn reporter(self) -> Box<dyn Reporter> {
        match self {
            LogFormat::Text => Box::new(TextReporter),
            LogFormat::Json => Box::new(JsonReporter),
        }
    }
}

pub struct TextReporter;

impl TextReporter {
    pub fn render(event: &Event) -> String {
        let mut out = String::new();
        match event {
            Event::Section { title } => {
                let _ = writeln!(out, "# {}", title);
            }
            Event::RootParents { package, parents } => {
                let _ = writeln!(out, "direct dependencies that require the vulnerable package:");
                let _ = writeln!(out, "{}", package);
                for (i, parent) in parents.iter().enumerate() {
                    let branch = if i + 1 == parents.len() { "└──" } else { "├──" };
                    let _ = writeln!(out, "{} {}", branch, parent);
                }
            }
            Event::Summary { summary } => {
                let rows = [
                    ("Errors", summary.not_fixed),
                    ("Fixed via replace", summary.fixed_via_replace),
                    ("Fixed via parent update(s)", summary.fixed_via_parent),
                    ("Ignored", summary.ignored),
                ];
                for (label, count) in rows {
                    let _ = writeln!(out, "{:<28} {:>5}", label, count);
                }
            }
        }
        out
    }
}

impl Reporter for TextReporter {
    fn report(&self, event: &Event) {
        for line in Self::render(event).lines() {
            info!("{}", line);
        }
    }
}

pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(json) => info!(target: REPORT_TARGET, "{}", json),
            Err(err) => warn!("Failed to serialize event: {:#}", err),
        }
    }
}

/// One line of `--log-format json` output.
///
/// Events logged by [`JsonReporter`] are embedded as objects instead of
/// being quoted a second time.
pub fn json_log_line(level: &str, target: &str, msg: String, ts: Option<String>) -> Value {
    let msg = if target == REPORT_TARGET {
        serde_json::from_str::<Value>(&msg).unwrap_or(Value::String(msg))
    } else {
        Value::String(msg)
    };
    let mut line = serde_json::json!({
        "level": level,
        "target": target,
        "msg": msg,
    });
    if let Some(ts) = ts {
        line["ts"] = ts.into();
    }
    line
}
