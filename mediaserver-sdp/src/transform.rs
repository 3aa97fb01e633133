//! Raw, untyped representation of a session description.
//!
//! [`parse`] turns text into a [`RawDescription`] by running every line
//! through the [`grammar`](crate::grammar) table, [`write`] does the reverse.
//! The typed model in [`crate::session`] is built on top of this layer.

use std::collections::BTreeMap;
use std::fmt;

use log::trace;
use regex::Captures;
use shared::error::{Error, Result};

use crate::grammar::{
    Format, GRAMMAR, INNER_ORDER, MANDATORY, OUTER_ORDER, PAYLOAD_BOUND, Rule, ValueKind,
};

/// A single captured value, coerced according to the rule's [`ValueKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.parse().ok(),
            Value::Float(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Str(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

value_from_int!(u8, u16, u32, u64, i64);

/// Named values of one parsed line.
pub type Record = BTreeMap<&'static str, Value>;

/// Builds a [`Record`] from `(name, value)` pairs.
pub fn record<const N: usize>(values: [(&'static str, Value); N]) -> Record {
    values.into_iter().collect()
}

/// Records attached to one location, either the session or one media section.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Section {
    fields: BTreeMap<&'static str, Record>,
    lists: BTreeMap<&'static str, Vec<Record>>,
}

impl Section {
    pub fn get(&self, name: &str) -> Option<&Record> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &'static str, record: Record) {
        self.fields.insert(name, record);
    }

    /// Value of a single capture rule such as `mid` or `setup`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(|r| r.get("value"))
    }

    pub fn set_value(&mut self, name: &'static str, value: impl Into<Value>) {
        self.fields.insert(name, record([("value", value.into())]));
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn list(&self, name: &str) -> &[Record] {
        self.lists.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn push(&mut self, name: &'static str, record: Record) {
        self.lists.entry(name).or_default().push(record);
    }
}

/// A whole session description as generic records.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawDescription {
    pub session: Section,
    pub media: Vec<Section>,
}

fn is_sdp_line(line: &str) -> bool {
    let b = line.as_bytes();
    b.len() >= 2 && b[0].is_ascii_lowercase() && b[1] == b'='
}

fn coerce(kind: ValueKind, raw: &str) -> Value {
    match kind {
        ValueKind::Str => Value::Str(raw.to_owned()),
        ValueKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Str(raw.to_owned())),
        ValueKind::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Str(raw.to_owned())),
    }
}

fn parse_reg(rule: &Rule, caps: &Captures<'_>) -> Record {
    let mut record = Record::new();
    for (i, name) in rule.names.iter().enumerate() {
        if let Some(m) = caps.get(i + 1) {
            if !m.as_str().is_empty() {
                record.insert(*name, coerce(rule.kind_of(i), m.as_str()));
            }
        }
    }
    record
}

/// Parses session description text into generic records.
///
/// Lines which are not of the `x=...` form are ignored, unknown attributes are
/// kept in the `invalid` collection, and a mandatory line (`v=`, `o=`, `m=`)
/// that does not match its grammar fails the whole parse.
pub fn parse(text: &str) -> Result<RawDescription> {
    let mut raw = RawDescription::default();

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if !is_sdp_line(line) {
            continue;
        }

        let typ = line.as_bytes()[0] as char;
        let content = &line[2..];

        if typ == 'm' {
            raw.media.push(Section::default());
        }

        let Some(rules) = GRAMMAR.get(&typ) else {
            trace!("skipping unknown line type {line}");
            continue;
        };

        let location = match raw.media.last_mut() {
            Some(media) => media,
            None => &mut raw.session,
        };

        let mut matched = false;
        for rule in rules {
            if let Some(caps) = rule.reg.captures(content) {
                let record = parse_reg(rule, &caps);
                if let Some(name) = rule.name {
                    location.set(name, record);
                } else if let Some(push) = rule.push {
                    location.push(push, record);
                }
                matched = true;
                break;
            }
        }

        if !matched && MANDATORY.contains(&typ) {
            return Err(Error::ErrSdpSyntax(line.to_owned()));
        }
    }

    Ok(raw)
}

fn format_line(format: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(format.len() + 16);
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') | Some('d') | Some('f') => {
                chars.next();
                if let Some(arg) = args.next() {
                    out.push_str(arg);
                }
            }
            Some('v') => {
                chars.next();
                args.next();
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push(c),
        }
    }

    out
}

fn make_line(typ: char, rule: &Rule, record: &Record) -> String {
    let format = match &rule.format {
        Format::Fixed(f) => (*f).to_owned(),
        Format::Dynamic(func) => func(record),
    };
    let args: Vec<String> = rule
        .names
        .iter()
        .map(|n| record.get(n).map(Value::to_string).unwrap_or_default())
        .collect();

    format!("{typ}={}", format_line(&format, &args))
}

fn payload_of(record: &Record) -> String {
    record
        .get("payload")
        .map(Value::to_string)
        .unwrap_or_default()
}

fn write_type(typ: char, section: &Section, lines: &mut Vec<String>) {
    let Some(rules) = GRAMMAR.get(&typ) else {
        return;
    };

    let rtp_payloads: Vec<String> = section.list("rtp").iter().map(payload_of).collect();

    for rule in rules {
        if let Some(name) = rule.name {
            if let Some(record) = section.get(name) {
                lines.push(make_line(typ, rule, record));
            }
            continue;
        }

        let Some(push) = rule.push else {
            continue;
        };

        if PAYLOAD_BOUND.contains(&push) {
            // the ones matching an rtpmap were already written next to it
            for record in section.list(push) {
                if !rtp_payloads.contains(&payload_of(record)) {
                    lines.push(make_line(typ, rule, record));
                }
            }
            continue;
        }

        for record in section.list(push) {
            lines.push(make_line(typ, rule, record));

            if push == "rtp" {
                let payload = payload_of(record);
                for bound in PAYLOAD_BOUND {
                    let Some(bound_rule) = rules.iter().find(|r| r.push == Some(*bound)) else {
                        continue;
                    };
                    for attached in section.list(bound) {
                        if payload_of(attached) == payload {
                            lines.push(make_line(typ, bound_rule, attached));
                        }
                    }
                }
            }
        }
    }
}

/// Writes generic records back to text, in canonical line order.
pub fn write(raw: &RawDescription) -> String {
    let mut session = raw.session.clone();
    if !session.has("version") {
        session.set_value("version", 0u8);
    }
    if !session.has("name") {
        session.set_value("name", "-");
    }
    if !session.has("timing") {
        session.set("timing", record([("start", 0u8.into()), ("stop", 0u8.into())]));
    }

    let mut lines = vec![];
    for typ in OUTER_ORDER {
        write_type(*typ, &session, &mut lines);
    }

    for media in &raw.media {
        write_type('m', media, &mut lines);
        for typ in INNER_ORDER {
            write_type(*typ, media, &mut lines);
        }
    }

    let mut text = lines.join("\r\n");
    text.push_str("\r\n");
    text
}

/// Parses `a=fmtp` style parameters, `k=v;k2` gives `{k: v, k2: ""}`.
pub fn parse_params(s: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for param in s.split(';') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        match param.split_once('=') {
            Some((k, v)) => params.insert(k.trim().to_owned(), v.trim().to_owned()),
            None => params.insert(param.to_owned(), String::new()),
        };
    }
    params
}

/// Inverse of [`parse_params`].
pub fn format_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{k}={v}")
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Parses an `m=` payload list, ignoring anything which is not a number.
pub fn parse_payloads(s: &str) -> Vec<u32> {
    s.split_whitespace().filter_map(|p| p.parse().ok()).collect()
}

/// Parses a simulcast stream list, `1,~2;3` gives `[[(1, false), (2, true)], [(3, false)]]`.
pub fn parse_simulcast_stream_list(s: &str) -> Vec<Vec<(String, bool)>> {
    s.split(';')
        .filter(|group| !group.is_empty())
        .map(|group| {
            group
                .split(',')
                .filter(|alt| !alt.is_empty())
                .map(|alt| match alt.strip_prefix('~') {
                    Some(id) => (id.to_owned(), true),
                    None => (alt.to_owned(), false),
                })
                .collect()
        })
        .collect()
}
