use std::fmt;

use super::SessionInfo;
use crate::codec::{CODEC_RTX, CodecInfo};
use crate::direction::DirectionWay;
use crate::media::MediaInfo;
use crate::rid::RidInfo;
use crate::simulcast::{SimulcastInfo, SimulcastStreamInfo};
use crate::stream::StreamInfo;
use crate::track::TrackInfo;
use crate::transform::{self, RawDescription, Record, Section, Value, record};

const PROTOCOL: &str = "UDP/TLS/RTP/SAVPF";
const DISCARD_PORT: u16 = 9;
const REJECTED_PORT: u16 = 0;
const ANY_ADDRESS: &str = "0.0.0.0";
const LOCAL_ADDRESS: &str = "127.0.0.1";

fn address_record(port: Option<u16>, address: &str) -> Record {
    let mut r = record([
        ("netType", "IN".into()),
        ("ipVer", 4u8.into()),
        ("address", address.into()),
    ]);
    if let Some(port) = port {
        r.insert("port", port.into());
    }
    r
}

fn push_codec(section: &mut Section, media: &MediaInfo, codec: &CodecInfo) {
    let clock_rate = codec.clock_rate_or_default(media.kind);

    let mut rtp = record([
        ("payload", codec.payload_type.into()),
        ("codec", codec.name.as_str().into()),
        ("rate", clock_rate.into()),
    ]);
    if let Some(channels) = codec.channels_or_default() {
        rtp.insert("encoding", channels.to_string().into());
    }
    section.push("rtp", rtp);

    for fb in &codec.rtcp_fbs {
        let mut r = record([
            ("payload", codec.payload_type.to_string().into()),
            ("type", fb.id.as_str().into()),
        ]);
        if !fb.params.is_empty() {
            r.insert("subtype", fb.params.join(" ").into());
        }
        section.push("rtcpFb", r);
    }

    if let Some(config) = codec.fmtp() {
        section.push(
            "fmtp",
            record([("payload", codec.payload_type.into()), ("config", config.into())]),
        );
    }

    if let Some(rtx) = codec.rtx {
        section.push(
            "rtp",
            record([
                ("payload", rtx.into()),
                ("codec", CODEC_RTX.into()),
                ("rate", clock_rate.into()),
            ]),
        );
        section.push(
            "fmtp",
            record([
                ("payload", rtx.into()),
                ("config", format!("apt={}", codec.payload_type).into()),
            ]),
        );
    }
}

fn push_rid(section: &mut Section, rid: &RidInfo) {
    let mut r = record([
        ("id", rid.id.as_str().into()),
        ("direction", rid.direction.to_string().into()),
    ]);
    if let Some(params) = rid.restrictions() {
        r.insert("params", params.into());
    }
    section.push("rids", r);
}

fn set_simulcast(section: &mut Section, simulcast: &SimulcastInfo) {
    let lists: Vec<(DirectionWay, String)> = [DirectionWay::Send, DirectionWay::Recv]
        .into_iter()
        .filter_map(|dir| simulcast.format_list(dir).map(|list| (dir, list)))
        .collect();

    let mut r = Record::new();
    for ((dir, list), (dir_key, list_key)) in lists.iter().zip([("dir1", "list1"), ("dir2", "list2")]) {
        r.insert(dir_key, dir.to_string().into());
        r.insert(list_key, list.as_str().into());
    }
    if !r.is_empty() {
        section.set("simulcast", r);
    }
}

/// RIDs and simulcast description announcing the encodings of a sent track.
fn simulcast_from_encodings(track: &TrackInfo) -> (Vec<RidInfo>, SimulcastInfo) {
    let mut rids = vec![];
    let mut simulcast = SimulcastInfo::new();

    for alternatives in &track.encodings {
        let mut streams = vec![];
        for encoding in alternatives {
            let mut rid = RidInfo::new(&encoding.id, DirectionWay::Send);
            rid.formats = encoding.codecs.keys().copied().collect();
            rid.params = encoding.params.clone();
            rids.push(rid);
            streams.push(SimulcastStreamInfo::new(&encoding.id, encoding.paused));
        }
        simulcast.add_alternatives(DirectionWay::Send, streams);
    }

    (rids, simulcast)
}

fn push_sources(section: &mut Section, stream: &StreamInfo, track: &TrackInfo, with_msid: bool) {
    for group in &track.groups {
        let ssrcs: Vec<String> = group.ssrcs.iter().map(|s| s.to_string()).collect();
        section.push(
            "ssrcGroups",
            record([
                ("semantics", group.semantics.as_str().into()),
                ("ssrcs", ssrcs.join(" ").into()),
            ]),
        );
    }

    for ssrc in &track.ssrcs {
        section.push(
            "ssrcs",
            record([
                ("id", (*ssrc).into()),
                ("attribute", "cname".into()),
                ("value", stream.id.as_str().into()),
            ]),
        );
        if with_msid {
            section.push(
                "ssrcs",
                record([
                    ("id", (*ssrc).into()),
                    ("attribute", "msid".into()),
                    ("value", format!("{} {}", stream.id, track.id).into()),
                ]),
            );
        }
    }
}

impl SessionInfo {
    /// Tracks written on `media`: the ones bound to it, plus the unbound
    /// ones of its kind when it is the first media section of that kind.
    fn tracks_on<'a>(&'a self, media: &MediaInfo) -> Vec<(&'a StreamInfo, &'a TrackInfo, bool)> {
        let first_of_kind = self
            .first_media(media.kind)
            .is_some_and(|first| first.id == media.id);

        let mut tracks = vec![];
        for stream in self.streams.values() {
            for track in stream.tracks.values() {
                let bound = track
                    .media_id
                    .as_deref()
                    .is_some_and(|mid| self.media_by_id(mid).is_some());
                if bound {
                    if track.media_id.as_deref() == Some(media.id.as_str()) {
                        tracks.push((stream, track, true));
                    }
                } else if first_of_kind && track.kind == media.kind {
                    tracks.push((stream, track, false));
                }
            }
        }
        tracks
    }

    fn media_section(&self, media: &MediaInfo) -> Section {
        let mut section = Section::default();

        let payloads = media.payload_types();
        let (port, payloads) = if payloads.is_empty() {
            (REJECTED_PORT, "0".to_owned())
        } else {
            let pts: Vec<String> = payloads.iter().map(|pt| pt.to_string()).collect();
            (DISCARD_PORT, pts.join(" "))
        };
        section.set(
            "media",
            record([
                ("type", media.kind.to_string().into()),
                ("port", port.into()),
                ("protocol", PROTOCOL.into()),
                ("payloads", payloads.into()),
            ]),
        );
        section.set(
            "connection",
            record([("version", 4u8.into()), ("ip", ANY_ADDRESS.into())]),
        );
        if media.bitrate > 0 {
            section.push(
                "bandwidth",
                record([("type", "AS".into()), ("limit", media.bitrate.into())]),
            );
        }
        section.set("rtcp", address_record(Some(DISCARD_PORT), ANY_ADDRESS));

        if let Some(ice) = &self.ice {
            section.set_value("iceUfrag", ice.ufrag.as_str());
            section.set_value("icePwd", ice.pwd.as_str());
        }
        for candidate in &self.candidates {
            let mut r = record([
                ("foundation", candidate.foundation.as_str().into()),
                ("component", candidate.component_id.into()),
                ("transport", candidate.transport.as_str().into()),
                ("priority", candidate.priority.into()),
                ("ip", candidate.address.as_str().into()),
                ("port", candidate.port.into()),
                ("type", candidate.typ.as_str().into()),
            ]);
            if let (Some(addr), Some(port)) = (&candidate.rel_addr, candidate.rel_port) {
                r.insert("raddr", addr.as_str().into());
                r.insert("rport", port.into());
            }
            section.push("candidates", r);
        }
        if self.ice.as_ref().is_some_and(|ice| ice.end_of_candidates) {
            section.set_value("endOfCandidates", "end-of-candidates");
        }

        if let Some(dtls) = &self.dtls {
            section.set(
                "fingerprint",
                record([
                    ("type", dtls.hash.as_str().into()),
                    ("hash", dtls.fingerprint.as_str().into()),
                ]),
            );
            section.set_value("setup", dtls.setup.to_string());
        }

        section.set_value("mid", media.id.as_str());

        let tracks = self.tracks_on(media);
        if let Some((stream, track, _)) = tracks.iter().find(|(_, _, bound)| *bound) {
            section.set_value("msid", format!("{} {}", stream.id, track.id));
        }

        for (id, uri) in &media.extensions {
            section.push(
                "ext",
                record([("value", (*id).into()), ("uri", uri.as_str().into())]),
            );
        }

        section.set_value("direction", media.direction.to_string());
        section.set_value("rtcpMux", "rtcp-mux");
        section.set_value("rtcpRsize", "rtcp-rsize");

        for codec in media.codecs.values() {
            push_codec(&mut section, media, codec);
        }

        if media.rids.is_empty() {
            let sent = tracks
                .iter()
                .find(|(_, track, bound)| *bound && track.has_encodings());
            if let Some((_, track, _)) = sent {
                let (rids, simulcast) = simulcast_from_encodings(track);
                for rid in &rids {
                    push_rid(&mut section, rid);
                }
                set_simulcast(&mut section, &simulcast);
            }
        } else {
            for rid in media.rids.values() {
                push_rid(&mut section, rid);
            }
        }
        if let Some(simulcast) = &media.simulcast {
            set_simulcast(&mut section, simulcast);
        }

        for (stream, track, bound) in &tracks {
            push_sources(&mut section, stream, track, !*bound);
        }

        section
    }

    fn to_raw(&self) -> RawDescription {
        let mut raw = RawDescription::default();

        raw.session.set(
            "origin",
            record([
                ("username", "-".into()),
                ("sessionId", Value::Str(self.id.to_string())),
                ("sessionVersion", self.version.into()),
                ("netType", "IN".into()),
                ("ipVer", 4u8.into()),
                ("address", LOCAL_ADDRESS.into()),
            ]),
        );
        raw.session.set_value("name", "-");
        raw.session
            .set("timing", record([("start", 0u8.into()), ("stop", 0u8.into())]));

        if self.ice.as_ref().is_some_and(|ice| ice.lite) {
            raw.session.set_value("icelite", "ice-lite");
        }
        if !self.medias.is_empty() {
            let mids: Vec<&str> = self.medias.iter().map(|m| m.id.as_str()).collect();
            raw.session.push(
                "groups",
                record([("type", "BUNDLE".into()), ("mids", mids.join(" ").into())]),
            );
        }
        raw.session.set(
            "msidSemantic",
            record([("semantic", "WMS".into()), ("token", "*".into())]),
        );

        raw.media = self.medias.iter().map(|m| self.media_section(m)).collect();
        raw
    }

    /// Writes the session as canonical session description text.
    pub fn write(&self) -> String {
        transform::write(&self.to_raw())
    }
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.write())
    }
}
