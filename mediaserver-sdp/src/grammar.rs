//! Line grammar of the session description format.
//!
//! Every line type (`v`, `o`, `m`, `a`, ...) maps to an ordered list of
//! [`Rule`]s. When parsing, the first rule whose pattern matches the line
//! content wins. When writing, rules are visited in table order, which makes
//! the table order the canonical attribute order of the output.
//!
//! A rule either stores its captures as a single named record (`name`) or
//! appends one more record to a repeated collection (`push`).
//!
//! ## Specifications
//!
//! * [RFC 8866](https://datatracker.ietf.org/doc/html/rfc8866)
//! * [RFC 8829](https://datatracker.ietf.org/doc/html/rfc8829)

use std::collections::HashMap;

use regex::Regex;

use crate::transform::Record;

/// Coercion applied to one captured group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    Float,
}

/// How a record is turned back into line content.
///
/// Formats use `%s`, `%d` and `%f` placeholders that consume the rule's named
/// values in order, `%v` consumes a value and prints nothing.
pub enum Format {
    Fixed(&'static str),
    Dynamic(fn(&Record) -> String),
}

pub struct Rule {
    pub name: Option<&'static str>,
    pub push: Option<&'static str>,
    pub reg: Regex,
    pub names: &'static [&'static str],
    pub kinds: &'static [ValueKind],
    pub format: Format,
}

impl Rule {
    /// key under which the parsed record is stored
    pub fn key(&self) -> &'static str {
        self.name.or(self.push).unwrap_or_default()
    }

    pub fn kind_of(&self, index: usize) -> ValueKind {
        self.kinds.get(index).copied().unwrap_or(ValueKind::Str)
    }
}

/// Collections written right after the rtpmap line sharing their payload type.
pub(crate) const PAYLOAD_BOUND: &[&str] = &["rtcpFbTrrInt", "rtcpFb", "fmtp"];

/// Line types whose content must match one of their rules.
pub(crate) const MANDATORY: &[char] = &['v', 'o', 'm'];

/// Session level write order.
pub(crate) const OUTER_ORDER: &[char] = &[
    'v', 'o', 's', 'i', 'u', 'e', 'p', 'c', 'b', 't', 'r', 'z', 'a',
];

/// Media level write order, after the `m=` line itself.
pub(crate) const INNER_ORDER: &[char] = &['i', 'c', 'b', 'a'];

use ValueKind::{Float as F, Int as D, Str as S};

fn scalar(
    name: &'static str,
    reg: &str,
    names: &'static [&'static str],
    kinds: &'static [ValueKind],
    format: Format,
) -> Rule {
    Rule {
        name: Some(name),
        push: None,
        reg: compile(reg),
        names,
        kinds,
        format,
    }
}

fn collection(
    push: &'static str,
    reg: &str,
    names: &'static [&'static str],
    kinds: &'static [ValueKind],
    format: Format,
) -> Rule {
    Rule {
        name: None,
        push: Some(push),
        reg: compile(reg),
        names,
        kinds,
        format,
    }
}

fn compile(reg: &str) -> Regex {
    // patterns are static, a failure here is a programming error caught by the grammar tests
    Regex::new(reg).unwrap()
}

fn has(record: &Record, key: &str) -> bool {
    record.contains_key(key)
}

fn rtcp_format(r: &Record) -> String {
    if has(r, "address") {
        "rtcp:%d %s IP%d %s".to_owned()
    } else {
        "rtcp:%d".to_owned()
    }
}

fn candidate_format(r: &Record) -> String {
    let mut s = "candidate:%s %d %s %d %s %d typ %s".to_owned();
    s += if has(r, "raddr") {
        " raddr %s rport %d"
    } else {
        "%v%v"
    };
    s += if has(r, "tcptype") { " tcptype %s" } else { "%v" };
    s += if has(r, "generation") {
        " generation %d"
    } else {
        "%v"
    };
    s += if has(r, "network-id") {
        " network-id %d"
    } else {
        "%v"
    };
    s += if has(r, "network-cost") {
        " network-cost %d"
    } else {
        "%v"
    };
    s
}

fn extmap_format(r: &Record) -> String {
    let mut s = "extmap:%d".to_owned();
    s += if has(r, "direction") { "/%s" } else { "%v" };
    s += " %s";
    if has(r, "config") {
        s += " %s";
    }
    s
}

fn rtpmap_format(r: &Record) -> String {
    if has(r, "encoding") {
        "rtpmap:%d %s/%d/%s".to_owned()
    } else if has(r, "rate") {
        "rtpmap:%d %s/%d".to_owned()
    } else {
        "rtpmap:%d %s".to_owned()
    }
}

fn rtcp_fb_format(r: &Record) -> String {
    if has(r, "subtype") {
        "rtcp-fb:%s %s %s".to_owned()
    } else {
        "rtcp-fb:%s %s".to_owned()
    }
}

fn crypto_format(r: &Record) -> String {
    if has(r, "sessionConfig") {
        "crypto:%d %s %s %s".to_owned()
    } else {
        "crypto:%d %s %s".to_owned()
    }
}

fn rid_format(r: &Record) -> String {
    if has(r, "params") {
        "rid:%s %s %s".to_owned()
    } else {
        "rid:%s %s".to_owned()
    }
}

fn simulcast_format(r: &Record) -> String {
    if has(r, "dir2") {
        "simulcast:%s %s %s %s".to_owned()
    } else {
        "simulcast:%s %s".to_owned()
    }
}

fn imageattr_format(r: &Record) -> String {
    if has(r, "dir2") {
        "imageattr:%s %s %s %s %s".to_owned()
    } else {
        "imageattr:%s %s %s".to_owned()
    }
}

fn ssrc_format(r: &Record) -> String {
    if has(r, "value") {
        "ssrc:%d %s:%s".to_owned()
    } else {
        "ssrc:%d %s".to_owned()
    }
}

fn sctpmap_format(r: &Record) -> String {
    if has(r, "maxMessageSize") {
        "sctpmap:%s %s %s".to_owned()
    } else {
        "sctpmap:%s %s".to_owned()
    }
}

fn media_format(r: &Record) -> String {
    if has(r, "payloads") {
        "%s %d %s %s".to_owned()
    } else {
        "%s %d %s".to_owned()
    }
}

fn origin_rules() -> Vec<Rule> {
    vec![scalar(
        "origin",
        r"^(\S*) (\S*) (\d*) (\S*) IP(\d) (\S*)",
        &[
            "username",
            "sessionId",
            "sessionVersion",
            "netType",
            "ipVer",
            "address",
        ],
        &[S, S, D, S, D, S],
        Format::Fixed("%s %s %d %s IP%d %s"),
    )]
}

fn media_rules() -> Vec<Rule> {
    vec![scalar(
        "media",
        r"^(\w*) (\d*) ([\w/]*)(?: (.*))?",
        &["type", "port", "protocol", "payloads"],
        &[S, D, S, S],
        Format::Dynamic(media_format),
    )]
}

fn attribute_rules() -> Vec<Rule> {
    vec![
        // session level
        collection(
            "groups",
            r"^group:(\w*) (.*)",
            &["type", "mids"],
            &[S, S],
            Format::Fixed("group:%s %s"),
        ),
        scalar(
            "msidSemantic",
            r"^msid-semantic:\s?(\w*) (\S*)",
            &["semantic", "token"],
            &[S, S],
            Format::Fixed("msid-semantic: %s %s"),
        ),
        scalar(
            "icelite",
            r"^(ice-lite)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        ),
        // transport
        scalar(
            "rtcp",
            r"^rtcp:(\d*)(?: (\S*) IP(\d) (\S*))?",
            &["port", "netType", "ipVer", "address"],
            &[D, S, D, S],
            Format::Dynamic(rtcp_format),
        ),
        scalar(
            "iceUfrag",
            r"^ice-ufrag:(\S*)",
            &["value"],
            &[S],
            Format::Fixed("ice-ufrag:%s"),
        ),
        scalar(
            "icePwd",
            r"^ice-pwd:(\S*)",
            &["value"],
            &[S],
            Format::Fixed("ice-pwd:%s"),
        ),
        scalar(
            "iceOptions",
            r"^ice-options:(\S*)",
            &["value"],
            &[S],
            Format::Fixed("ice-options:%s"),
        ),
        collection(
            "candidates",
            r"^candidate:(\S*) (\d*) (\S*) (\d*) (\S*) (\d*) typ (\S*)(?: raddr (\S*) rport (\d*))?(?: tcptype (\S*))?(?: generation (\d*))?(?: network-id (\d*))?(?: network-cost (\d*))?",
            &[
                "foundation",
                "component",
                "transport",
                "priority",
                "ip",
                "port",
                "type",
                "raddr",
                "rport",
                "tcptype",
                "generation",
                "network-id",
                "network-cost",
            ],
            &[S, D, S, D, S, D, S, S, D, S, D, D, D],
            Format::Dynamic(candidate_format),
        ),
        scalar(
            "endOfCandidates",
            r"^(end-of-candidates)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        ),
        scalar(
            "remoteCandidates",
            r"^remote-candidates:(.*)",
            &["value"],
            &[S],
            Format::Fixed("remote-candidates:%s"),
        ),
        scalar(
            "fingerprint",
            r"^fingerprint:(\S*) (\S*)",
            &["type", "hash"],
            &[S, S],
            Format::Fixed("fingerprint:%s %s"),
        ),
        scalar(
            "setup",
            r"^setup:(\w*)",
            &["value"],
            &[S],
            Format::Fixed("setup:%s"),
        ),
        // media identification
        scalar(
            "mid",
            r"^mid:([^\s]*)",
            &["value"],
            &[S],
            Format::Fixed("mid:%s"),
        ),
        scalar(
            "msid",
            r"^msid:(.*)",
            &["value"],
            &[S],
            Format::Fixed("msid:%s"),
        ),
        collection(
            "ext",
            r"^extmap:(\d+)(?:/(\w+))? (\S*)(?: (\S*))?",
            &["value", "direction", "uri", "config"],
            &[D, S, S, S],
            Format::Dynamic(extmap_format),
        ),
        scalar(
            "direction",
            r"^(sendrecv|recvonly|sendonly|inactive)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        ),
        scalar(
            "rtcpMux",
            r"^(rtcp-mux)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        ),
        scalar(
            "rtcpRsize",
            r"^(rtcp-rsize)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        ),
        // codecs
        collection(
            "rtp",
            r"^rtpmap:(\d*) ([\w\-.]*)(?:\s*/(\d*)(?:\s*/(\S*))?)?",
            &["payload", "codec", "rate", "encoding"],
            &[D, S, D, S],
            Format::Dynamic(rtpmap_format),
        ),
        collection(
            "rtcpFbTrrInt",
            r"^rtcp-fb:(\*|\d*) trr-int (\d*)",
            &["payload", "value"],
            &[S, D],
            Format::Fixed("rtcp-fb:%s trr-int %d"),
        ),
        collection(
            "rtcpFb",
            r"^rtcp-fb:(\*|\d*) ([\w\-_]*)(?: ([\w\-_]*))?",
            &["payload", "type", "subtype"],
            &[S, S, S],
            Format::Dynamic(rtcp_fb_format),
        ),
        collection(
            "fmtp",
            r"^fmtp:(\d*) ([\S| ]*)",
            &["payload", "config"],
            &[D, S],
            Format::Fixed("fmtp:%d %s"),
        ),
        scalar(
            "control",
            r"^control:(.*)",
            &["value"],
            &[S],
            Format::Fixed("control:%s"),
        ),
        collection(
            "crypto",
            r"^crypto:(\d*) ([\w_]*) (\S*)(?: (\S*))?",
            &["id", "suite", "config", "sessionConfig"],
            &[D, S, S, S],
            Format::Dynamic(crypto_format),
        ),
        scalar(
            "ptime",
            r"^ptime:(\d*(?:\.\d*)*)",
            &["value"],
            &[F],
            Format::Fixed("ptime:%f"),
        ),
        scalar(
            "maxptime",
            r"^maxptime:(\d*(?:\.\d*)*)",
            &["value"],
            &[F],
            Format::Fixed("maxptime:%f"),
        ),
        scalar(
            "framerate",
            r"^framerate:(\d+(?:$|\.\d+))",
            &["value"],
            &[F],
            Format::Fixed("framerate:%f"),
        ),
        // simulcast
        collection(
            "rids",
            r"^rid:([\d\w\-_]+) (\w+)(?: ([\S| ]*))?",
            &["id", "direction", "params"],
            &[S, S, S],
            Format::Dynamic(rid_format),
        ),
        scalar(
            "simulcast",
            r"^simulcast:(send|recv) ([a-zA-Z0-9\-_~;,]+)(?:\s?(send|recv) ([a-zA-Z0-9\-_~;,]+))?$",
            &["dir1", "list1", "dir2", "list2"],
            &[S, S, S, S],
            Format::Dynamic(simulcast_format),
        ),
        scalar(
            "simulcast03",
            r"^simulcast:[\s\t]+([\S+\s\t]+)$",
            &["value"],
            &[S],
            Format::Fixed("simulcast: %s"),
        ),
        collection(
            "imageattrs",
            r"^imageattr:(\d+|\*)[\s\t]+(send|recv)[\s\t]+(\*|\[\S+\])(?:[\s\t]+(recv|send)[\s\t]+(\*|\[\S+\]))?",
            &["pt", "dir1", "attrs1", "dir2", "attrs2"],
            &[S, S, S, S, S],
            Format::Dynamic(imageattr_format),
        ),
        // sources
        collection(
            "ssrcGroups",
            r"^ssrc-group:([\x21\x23\x24\x25\x26\x27\x2A\x2B\x2D\x2E\w]*) (.*)",
            &["semantics", "ssrcs"],
            &[S, S],
            Format::Fixed("ssrc-group:%s %s"),
        ),
        collection(
            "ssrcs",
            r"^ssrc:(\d*) ([\w_\-]*)(?::(.*))?",
            &["id", "attribute", "value"],
            &[D, S, S],
            Format::Dynamic(ssrc_format),
        ),
        // misc
        scalar(
            "sctpmap",
            r"^sctpmap:([\w_/]*) (\S*)(?: (\S*))?",
            &["sctpmapNumber", "app", "maxMessageSize"],
            &[D, S, D],
            Format::Dynamic(sctpmap_format),
        ),
        scalar(
            "xGoogleFlag",
            r"^x-google-flag:([^\s]*)",
            &["value"],
            &[S],
            Format::Fixed("x-google-flag:%s"),
        ),
        scalar(
            "sourceFilter",
            r"^source-filter: *(excl|incl) (\S*) (IP4|IP6|\*) (\S*) (.*)",
            &[
                "filterMode",
                "netType",
                "addressTypes",
                "destAddress",
                "srcList",
            ],
            &[S, S, S, S, S],
            Format::Fixed("source-filter: %s %s %s %s %s"),
        ),
        // anything else is kept verbatim
        collection("invalid", r"(.*)", &["value"], &[S], Format::Fixed("%s")),
    ]
}

fn build() -> HashMap<char, Vec<Rule>> {
    let mut grammar = HashMap::new();

    grammar.insert(
        'v',
        vec![scalar(
            "version",
            r"^(\d*)$",
            &["value"],
            &[D],
            Format::Fixed("%d"),
        )],
    );
    grammar.insert('o', origin_rules());
    grammar.insert(
        's',
        vec![scalar("name", "(.*)", &["value"], &[S], Format::Fixed("%s"))],
    );
    grammar.insert(
        'i',
        vec![scalar(
            "description",
            "(.*)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        )],
    );
    grammar.insert(
        'u',
        vec![scalar("uri", "(.*)", &["value"], &[S], Format::Fixed("%s"))],
    );
    grammar.insert(
        'e',
        vec![scalar("email", "(.*)", &["value"], &[S], Format::Fixed("%s"))],
    );
    grammar.insert(
        'p',
        vec![scalar("phone", "(.*)", &["value"], &[S], Format::Fixed("%s"))],
    );
    grammar.insert(
        'z',
        vec![scalar(
            "timezones",
            "(.*)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        )],
    );
    grammar.insert(
        'r',
        vec![scalar(
            "repeats",
            "(.*)",
            &["value"],
            &[S],
            Format::Fixed("%s"),
        )],
    );
    grammar.insert(
        't',
        vec![scalar(
            "timing",
            r"^(\d*) (\d*)",
            &["start", "stop"],
            &[D, D],
            Format::Fixed("%d %d"),
        )],
    );
    grammar.insert(
        'c',
        vec![scalar(
            "connection",
            r"^IN IP(\d) (\S*)",
            &["version", "ip"],
            &[D, S],
            Format::Fixed("IN IP%d %s"),
        )],
    );
    grammar.insert(
        'b',
        vec![collection(
            "bandwidth",
            r"^(TIAS|AS|CT|RR|RS):(\d*)",
            &["type", "limit"],
            &[S, D],
            Format::Fixed("%s:%d"),
        )],
    );
    grammar.insert('m', media_rules());
    grammar.insert('a', attribute_rules());

    grammar
}

lazy_static! {
    pub(crate) static ref GRAMMAR: HashMap<char, Vec<Rule>> = build();
}
