//! Line protocol spoken by the control server.
//!
//! A request is `?name arg…`; it is answered by zero or more informs
//! `#name …` followed by exactly one reply, `!name ok …` or
//! `!name fail <reason>`. Arguments are separated by single spaces, so
//! spaces and other special characters inside an argument are escaped:
//! `\_` space, `\\` backslash, `\n` newline, `\r` carriage return,
//! `\t` tab, `\0` nul, `\e` escape and `\@` for an empty argument.

use std::str::FromStr;

use thiserror::Error;

use fbfuse_core::{Command, CommandResult, CoreError, SensorReading};

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("requests start with '?'")]
    NotARequest,

    #[error("invalid escape sequence '\\{0}'")]
    BadEscape(char),

    #[error("unknown request '{0}'")]
    UnknownRequest(String),

    #[error("{request} expects {expected} argument(s), got {got}")]
    Arity {
        request: String,
        expected: String,
        got: usize,
    },

    #[error("invalid {field}: '{value}'")]
    BadArgument { field: &'static str, value: String },
}

/// What the server should do for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Execute(Command),
    Watchdog,
    Help,
    Halt,
}

/// Requests understood by the server, with their help text.
pub const REQUESTS: &[(&str, &str)] = &[
    ("configure", "configure product antennas nchans streams-json proxy"),
    ("deconfigure", "deconfigure product"),
    ("provision-beams", "provision-beams product"),
    ("reset-beams", "reset-beams product"),
    ("capture-start", "capture-start product"),
    ("capture-stop", "capture-stop product"),
    (
        "configure-coherent-beams",
        "configure-coherent-beams product nbeams antennas fscrunch tscrunch",
    ),
    (
        "configure-incoherent-beam",
        "configure-incoherent-beam product antennas fscrunch tscrunch",
    ),
    ("add-beam", "add-beam product target"),
    (
        "add-tiling",
        "add-tiling product target nbeams reference-frequency overlap epoch",
    ),
    (
        "set-configuration-authority",
        "set-configuration-authority product host port",
    ),
    (
        "set-default-sb-configuration",
        "set-default-sb-configuration product json",
    ),
    (
        "set-default-target-configuration",
        "set-default-target-configuration product json",
    ),
    ("target-start", "target-start product target"),
    ("target-stop", "target-stop product"),
    ("register-worker-server", "register-worker-server host port"),
    ("deregister-worker-server", "deregister-worker-server host port"),
    ("worker-server-list", "worker-server-list"),
    ("ping-workers", "ping-workers"),
    ("sensor-value", "sensor-value name"),
    ("sensor-list", "sensor-list [pattern]"),
    ("watchdog", "watchdog"),
    ("help", "help"),
    ("halt", "halt"),
];

/// Parse one input line. Blank lines yield `None`.
pub fn parse_request(line: &str) -> Result<Option<Request>, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(body) = line.strip_prefix('?') else {
        return Err(ProtocolError::NotARequest);
    };

    let mut tokens = body.split_whitespace();
    let name = tokens.next().ok_or(ProtocolError::NotARequest)?;
    let args = tokens.map(unescape).collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Request {
        name: name.to_string(),
        args,
    }))
}

fn args<'a, const N: usize>(req: &'a Request) -> Result<&'a [String; N], ProtocolError> {
    <&[String; N]>::try_from(req.args.as_slice()).map_err(|_| ProtocolError::Arity {
        request: req.name.clone(),
        expected: N.to_string(),
        got: req.args.len(),
    })
}

fn number<T: FromStr>(value: &str, field: &'static str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::BadArgument {
        field,
        value: value.to_string(),
    })
}

/// Map a parsed request onto the controller's command set.
#[allow(clippy::too_many_lines)]
pub fn to_action(req: &Request) -> Result<Action, ProtocolError> {
    let command = match req.name.as_str() {
        "watchdog" => {
            args::<0>(req)?;
            return Ok(Action::Watchdog);
        }
        "help" => {
            args::<0>(req)?;
            return Ok(Action::Help);
        }
        "halt" => {
            args::<0>(req)?;
            return Ok(Action::Halt);
        }

        "configure" => {
            let [product, antennas, nchans, streams, proxy] = args::<5>(req)?;
            Command::Configure {
                product: product.clone(),
                antennas: antennas.clone(),
                nchans: number(nchans, "nchans")?,
                streams_json: streams.clone(),
                proxy: proxy.clone(),
            }
        }
        "deconfigure" => {
            let [product] = args::<1>(req)?;
            Command::Deconfigure {
                product: product.clone(),
            }
        }
        "provision-beams" => {
            let [product] = args::<1>(req)?;
            Command::ProvisionBeams {
                product: product.clone(),
            }
        }
        "reset-beams" => {
            let [product] = args::<1>(req)?;
            Command::ResetBeams {
                product: product.clone(),
            }
        }
        "capture-start" => {
            let [product] = args::<1>(req)?;
            Command::CaptureStart {
                product: product.clone(),
            }
        }
        "capture-stop" => {
            let [product] = args::<1>(req)?;
            Command::CaptureStop {
                product: product.clone(),
            }
        }

        "configure-coherent-beams" => {
            let [product, nbeams, antennas, fscrunch, tscrunch] = args::<5>(req)?;
            Command::ConfigureCoherentBeams {
                product: product.clone(),
                nbeams: number(nbeams, "nbeams")?,
                antennas: antennas.clone(),
                fscrunch: number(fscrunch, "fscrunch")?,
                tscrunch: number(tscrunch, "tscrunch")?,
            }
        }
        "configure-incoherent-beam" => {
            let [product, antennas, fscrunch, tscrunch] = args::<4>(req)?;
            Command::ConfigureIncoherentBeam {
                product: product.clone(),
                antennas: antennas.clone(),
                fscrunch: number(fscrunch, "fscrunch")?,
                tscrunch: number(tscrunch, "tscrunch")?,
            }
        }
        "add-beam" => {
            let [product, target] = args::<2>(req)?;
            Command::AddBeam {
                product: product.clone(),
                target: target.clone(),
            }
        }
        "add-tiling" => {
            let [product, target, nbeams, frequency, overlap, epoch] = args::<6>(req)?;
            Command::AddTiling {
                product: product.clone(),
                target: target.clone(),
                nbeams: number(nbeams, "nbeams")?,
                reference_frequency: number(frequency, "reference frequency")?,
                overlap: number(overlap, "overlap")?,
                epoch: number(epoch, "epoch")?,
            }
        }

        "set-configuration-authority" => {
            let [product, host, port] = args::<3>(req)?;
            Command::SetConfigurationAuthority {
                product: product.clone(),
                host: host.clone(),
                port: number(port, "port")?,
            }
        }
        "set-default-sb-configuration" => {
            let [product, json] = args::<2>(req)?;
            Command::SetDefaultSbConfiguration {
                product: product.clone(),
                json: json.clone(),
            }
        }
        "set-default-target-configuration" => {
            let [product, json] = args::<2>(req)?;
            Command::SetDefaultTargetConfiguration {
                product: product.clone(),
                json: json.clone(),
            }
        }
        "target-start" => {
            let [product, target] = args::<2>(req)?;
            Command::TargetStart {
                product: product.clone(),
                target: target.clone(),
            }
        }
        "target-stop" => {
            let [product] = args::<1>(req)?;
            Command::TargetStop {
                product: product.clone(),
            }
        }

        "register-worker-server" => {
            let [host, port] = args::<2>(req)?;
            Command::RegisterWorkerServer {
                host: host.clone(),
                port: number(port, "port")?,
            }
        }
        "deregister-worker-server" => {
            let [host, port] = args::<2>(req)?;
            Command::DeregisterWorkerServer {
                host: host.clone(),
                port: number(port, "port")?,
            }
        }
        "worker-server-list" => {
            args::<0>(req)?;
            Command::WorkerServerList
        }
        "ping-workers" => {
            args::<0>(req)?;
            Command::PingWorkers
        }

        "sensor-value" => {
            let [name] = args::<1>(req)?;
            Command::SensorValue { name: name.clone() }
        }
        "sensor-list" => match req.args.as_slice() {
            [] => Command::SensorList {
                pattern: String::new(),
            },
            [pattern] => Command::SensorList {
                pattern: pattern.clone(),
            },
            more => {
                return Err(ProtocolError::Arity {
                    request: req.name.clone(),
                    expected: "0 or 1".into(),
                    got: more.len(),
                });
            }
        },

        other => return Err(ProtocolError::UnknownRequest(other.to_string())),
    };
    Ok(Action::Execute(command))
}

// ── Responses ───────────────────────────────────────────────────────

fn message(mark: char, name: &str, args: &[&str]) -> String {
    let mut line = format!("{mark}{name}");
    for arg in args {
        line.push(' ');
        line.push_str(&escape(arg));
    }
    line
}

pub fn inform(name: &str, args: &[&str]) -> String {
    message('#', name, args)
}

pub fn ok(name: &str, args: &[&str]) -> String {
    let mut all = vec!["ok"];
    all.extend_from_slice(args);
    message('!', name, &all)
}

pub fn fail(name: &str, reason: &str) -> String {
    message('!', name, &["fail", reason])
}

fn timestamp(reading: &SensorReading) -> String {
    let at = reading.updated_at;
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

/// Render a command outcome as informs followed by the reply.
pub fn respond(name: &str, result: Result<CommandResult, CoreError>) -> Vec<String> {
    let result = match result {
        Ok(result) => result,
        Err(e) => return vec![fail(name, &e.to_string())],
    };

    let (mut lines, count) = match result {
        CommandResult::Ok => return vec![ok(name, &[])],
        CommandResult::WorkerList(workers) => {
            let lines: Vec<String> = workers
                .iter()
                .map(|(worker, allocated)| {
                    let tag = if *allocated { "allocated" } else { "free" };
                    inform(name, &[&worker.to_string(), tag])
                })
                .collect();
            (lines, workers.len())
        }
        CommandResult::WorkerHealth(workers) => {
            let lines: Vec<String> = workers
                .iter()
                .map(|(worker, healthy)| {
                    let tag = if *healthy { "ok" } else { "unreachable" };
                    inform(name, &[&worker.to_string(), tag])
                })
                .collect();
            (lines, workers.len())
        }
        CommandResult::Sensor(reading) => {
            let line = inform(
                name,
                &[
                    &timestamp(&reading),
                    "1",
                    &reading.name,
                    &reading.status.to_string(),
                    &reading.value.to_string(),
                ],
            );
            (vec![line], 1)
        }
        CommandResult::SensorList(readings) => {
            let lines: Vec<String> = readings
                .iter()
                .map(|r| {
                    inform(
                        name,
                        &[&r.name, &r.status.to_string(), &r.value.to_string()],
                    )
                })
                .collect();
            (lines, readings.len())
        }
    };
    lines.push(ok(name, &[&count.to_string()]));
    lines
}

// ── Escaping ────────────────────────────────────────────────────────

pub fn escape(arg: &str) -> String {
    if arg.is_empty() {
        return "\\@".into();
    }
    let mut out = String::with_capacity(arg.len());
    for c in arg.chars() {
        match c {
            ' ' => out.push_str("\\_"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '\x1b' => out.push_str("\\e"),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape(token: &str) -> Result<String, ProtocolError> {
    if token == "\\@" {
        return Ok(String::new());
    }
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next() {
            Some('_') => ' ',
            Some('\\') => '\\',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('0') => '\0',
            Some('e') => '\x1b',
            Some(other) => return Err(ProtocolError::BadEscape(other)),
            None => return Err(ProtocolError::BadEscape(' ')),
        };
        out.push(decoded);
    }
    Ok(out)
}
