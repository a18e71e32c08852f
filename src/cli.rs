use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum CliCommand {
    Export {
        fixture: PathBuf,
        out: Option<PathBuf>,
        at: Option<DateTime<Utc>>,
    },
    Topology {
        fixture: PathBuf,
        at: Option<DateTime<Utc>>,
    },
    Reports {
        out: Option<PathBuf>,
    },
    Help,
    Version,
}

pub(crate) fn version_text() -> String {
    format!("netmap-core {}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn usage_text() -> String {
    format!(
        "{version}
Network map engine: topology and blueprint reports from connection telemetry

Usage:
  netmap-core export --fixture <FILE> [--out <DIR>] [--at <RFC3339>]
  netmap-core topology --fixture <FILE> [--at <RFC3339>]
  netmap-core reports [--out <DIR>]
  netmap-core --help
  netmap-core --version

Options:
  -f, --fixture <FILE>  JSON document with telemetry, inventory and CMDB records
  -o, --out <DIR>       Report directory (default: NETWORK_MAP_REPORT_DIR or <data dir>/netmap/reports)
      --at <RFC3339>    Treat this instant as \"now\" when windowing telemetry
  -h, --help            Show this help text
  -V, --version         Show version",
        version = version_text(),
    )
}

fn parse_at_arg(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            anyhow::anyhow!(
                "Invalid value for --at: '{}'. Expected an RFC 3339 timestamp.\n\n{}",
                raw,
                usage_text()
            )
        })
}

fn flag_value<'a>(arg: &'a str, long: &str) -> Option<&'a str> {
    arg.strip_prefix(long)?.strip_prefix('=')
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut fixture: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut at: Option<DateTime<Utc>> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "export" | "topology" | "reports" => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    return Err(anyhow::anyhow!(
                        "Multiple commands provided. Use only one command.\n\n{}",
                        usage_text()
                    ));
                }
                command = Some(arg.to_string());
            }
            "-f" | "--fixture" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --fixture.\n\n{}", usage_text())
                })?;
                fixture = Some(PathBuf::from(value.as_ref()));
            }
            "-o" | "--out" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing value for --out.\n\n{}", usage_text()))?;
                out = Some(PathBuf::from(value.as_ref()));
            }
            "--at" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing value for --at.\n\n{}", usage_text()))?;
                at = Some(parse_at_arg(value.as_ref())?);
            }
            _ if flag_value(arg, "--fixture").is_some() => {
                let value = flag_value(arg, "--fixture").unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!("Missing value for --fixture.\n\n{}", usage_text()));
                }
                fixture = Some(PathBuf::from(value));
            }
            _ if flag_value(arg, "--out").is_some() => {
                let value = flag_value(arg, "--out").unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!("Missing value for --out.\n\n{}", usage_text()));
                }
                out = Some(PathBuf::from(value));
            }
            _ if flag_value(arg, "--at").is_some() => {
                at = Some(parse_at_arg(flag_value(arg, "--at").unwrap_or_default())?);
            }
            _ => {
                return Err(anyhow::anyhow!("Unknown argument: {arg}\n\n{}", usage_text()));
            }
        }
    }

    let require_fixture = |fixture: Option<PathBuf>, name: &str| {
        fixture.ok_or_else(|| anyhow::anyhow!("{} requires --fixture <FILE>.\n\n{}", name, usage_text()))
    };

    match command.as_deref() {
        None => Ok(CliCommand::Help),
        Some("export") => Ok(CliCommand::Export {
            fixture: require_fixture(fixture, "export")?,
            out,
            at,
        }),
        Some("topology") => {
            if out.is_some() {
                return Err(anyhow::anyhow!("--out is not valid with topology.\n\n{}", usage_text()));
            }
            Ok(CliCommand::Topology {
                fixture: require_fixture(fixture, "topology")?,
                at,
            })
        }
        Some("reports") => {
            if fixture.is_some() || at.is_some() {
                return Err(anyhow::anyhow!(
                    "--fixture/--at are not valid with reports.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::Reports { out })
        }
        Some(other) => Err(anyhow::anyhow!("Unknown command: {other}\n\n{}", usage_text())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_help_flag() {
        let parsed = parse_cli_args(["netmap-core", "--help"]).expect("help args should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_version_flag() {
        let parsed = parse_cli_args(["netmap-core", "-V"]).expect("version args should parse");
        assert_eq!(parsed, CliCommand::Version);
    }

    #[test]
    fn parse_no_command_shows_help() {
        let parsed = parse_cli_args(["netmap-core"]).expect("empty args should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_export_with_options() {
        let args = [
            "netmap-core",
            "export",
            "--fixture",
            "data.json",
            "--out=reports",
            "--at",
            "2024-05-01T12:00:00Z",
        ];
        let parsed = parse_cli_args(args).expect("export should parse");
        assert_eq!(
            parsed,
            CliCommand::Export {
                fixture: PathBuf::from("data.json"),
                out: Some(PathBuf::from("reports")),
                at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            }
        );
    }

    #[test]
    fn parse_topology_command() {
        let parsed = parse_cli_args(["netmap-core", "topology", "-f", "data.json"]).expect("topology should parse");
        assert_eq!(
            parsed,
            CliCommand::Topology {
                fixture: PathBuf::from("data.json"),
                at: None
            }
        );
    }

    #[test]
    fn parse_export_requires_fixture() {
        let err = parse_cli_args(["netmap-core", "export"]).expect_err("fixture is required");
        assert!(err.to_string().contains("export requires --fixture"));
    }

    #[test]
    fn parse_reports_rejects_fixture() {
        let err = parse_cli_args(["netmap-core", "reports", "--fixture", "x.json"])
            .expect_err("reports takes no fixture");
        assert!(err.to_string().contains("not valid with reports"));
    }

    #[test]
    fn parse_invalid_timestamp_errors() {
        let err = parse_cli_args(["netmap-core", "topology", "-f", "x.json", "--at", "yesterday"])
            .expect_err("bad timestamp should fail");
        assert!(err.to_string().contains("Invalid value for --at"));
    }

    #[test]
    fn parse_multiple_commands_error() {
        let err = parse_cli_args(["netmap-core", "export", "topology"]).expect_err("one command only");
        assert!(err.to_string().contains("Multiple commands"));
    }

    #[test]
    fn parse_unknown_argument_errors() {
        let err = parse_cli_args(["netmap-core", "--unknown"]).expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }
}
