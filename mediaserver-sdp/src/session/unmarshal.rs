use std::collections::BTreeSet;

use log::{debug, trace};
use shared::error::{Error, Result};

use super::SessionInfo;
use crate::candidate::CandidateInfo;
use crate::codec::{CodecInfo, MediaKind, PayloadType, RtcpFeedbackInfo, find_apt};
use crate::direction::{Direction, DirectionWay};
use crate::dtls::{DtlsInfo, Setup};
use crate::ice::IceInfo;
use crate::media::MediaInfo;
use crate::rid::RidInfo;
use crate::simulcast::SimulcastInfo;
use crate::stream::StreamInfo;
use crate::track::{SSRC, SourceGroupInfo, TrackEncodingInfo, TrackInfo};
use crate::transform::{self, Record, Section, parse_params};

const BANDWIDTH_AS: &str = "AS";
const SSRC_ATTR_CNAME: &str = "cname";
const SSRC_ATTR_MSID: &str = "msid";
const RTCP_FB_ANY: &str = "*";

fn str_of(record: &Record, key: &str) -> Option<String> {
    record.get(key).map(|v| v.to_string())
}

fn int_of(record: &Record, key: &str) -> Option<i64> {
    record.get(key).and_then(|v| v.as_int())
}

/// Integer value of `key` converted to `T`, `None` when missing or out of range.
fn num_of<T: TryFrom<i64>>(record: &Record, key: &str) -> Option<T> {
    let value = int_of(record, key)?;
    match T::try_from(value) {
        Ok(value) => Some(value),
        Err(_) => {
            trace!("{key} value {value} out of range");
            None
        }
    }
}

fn ice_of(section: &Section) -> Option<IceInfo> {
    let ufrag = section.value("iceUfrag")?.to_string();
    let pwd = section.value("icePwd")?.to_string();
    Some(IceInfo::new(&ufrag, &pwd))
}

fn dtls_of(section: &Section) -> Option<DtlsInfo> {
    let fingerprint = section.get("fingerprint")?;
    let setup = section
        .value("setup")
        .map(|v| Setup::from(v.to_string().as_str()))
        .unwrap_or_default();
    Some(DtlsInfo::new(
        setup,
        &str_of(fingerprint, "type").unwrap_or_default(),
        &str_of(fingerprint, "hash").unwrap_or_default(),
    ))
}

fn candidate_of(record: &Record) -> Option<CandidateInfo> {
    let candidate = CandidateInfo::new(
        &str_of(record, "foundation").unwrap_or_default(),
        num_of(record, "component")?,
        &str_of(record, "transport").unwrap_or_default(),
        num_of(record, "priority")?,
        &str_of(record, "ip").unwrap_or_default(),
        num_of(record, "port")?,
        &str_of(record, "type").unwrap_or_default(),
    );
    Some(match (str_of(record, "raddr"), num_of(record, "rport")) {
        (Some(addr), Some(port)) => candidate.with_related(&addr, port),
        _ => candidate,
    })
}

fn parse_ssrcs(list: &str) -> Vec<SSRC> {
    list.split_whitespace().filter_map(|s| s.parse().ok()).collect()
}

/// `stream track` of an `msid` value, a missing track id falls back to `default_track`.
fn split_msid(value: &str, default_track: &str) -> Option<(String, String)> {
    let mut parts = value.split_whitespace();
    let stream = parts.next()?;
    let track = parts.next().unwrap_or(default_track);
    Some((stream.to_owned(), track.to_owned()))
}

fn parse_codecs(media: &mut MediaInfo, section: &Section) {
    let mut rtx_payloads = BTreeSet::new();

    for rtp in section.list("rtp") {
        let Some(pt) = num_of::<PayloadType>(rtp, "payload") else {
            continue;
        };
        let name = str_of(rtp, "codec").unwrap_or_default();

        if MediaInfo::is_rtx_codec(&name) {
            rtx_payloads.insert(pt);
            continue;
        }
        if CodecInfo::is_redundancy(&name) {
            trace!("skipping redundancy codec {name}/{pt}");
            continue;
        }

        let mut codec = CodecInfo::new(&name, pt);
        codec.clock_rate = num_of(rtp, "rate");
        codec.channels = rtp
            .get("encoding")
            .and_then(|e| e.to_string().parse().ok())
            .or_else(|| codec.channels_or_default());
        media.add_codec(codec);
    }

    for fmtp in section.list("fmtp") {
        let Some(pt) = num_of::<PayloadType>(fmtp, "payload") else {
            continue;
        };
        let params = parse_params(&str_of(fmtp, "config").unwrap_or_default());

        if rtx_payloads.contains(&pt) {
            if let Some(codec) = find_apt(&params).and_then(|apt| media.codecs.get_mut(&apt)) {
                codec.rtx = Some(pt);
            }
        } else if let Some(codec) = media.codecs.get_mut(&pt) {
            codec.params = params;
        }
    }

    for fb in section.list("rtcpFb") {
        let payload = str_of(fb, "payload").unwrap_or_default();
        let mut params = vec![];
        if let Some(subtype) = str_of(fb, "subtype") {
            params.push(subtype);
        }
        let info = RtcpFeedbackInfo {
            id: str_of(fb, "type").unwrap_or_default(),
            params,
        };

        if payload == RTCP_FB_ANY {
            for codec in media.codecs.values_mut() {
                codec.add_rtcp_fb(info.clone());
            }
        } else if let Some(codec) = payload
            .parse::<PayloadType>()
            .ok()
            .and_then(|pt| media.codecs.get_mut(&pt))
        {
            codec.add_rtcp_fb(info);
        }
    }
}

fn parse_simulcast(section: &Section) -> Option<SimulcastInfo> {
    let mut simulcast = SimulcastInfo::new();

    if let Some(record) = section.get("simulcast") {
        for (dir, list) in [("dir1", "list1"), ("dir2", "list2")] {
            if let (Some(dir), Some(list)) = (str_of(record, dir), str_of(record, list)) {
                simulcast.parse_list(DirectionWay::from(dir.as_str()), &list);
            }
        }
    } else if let Some(value) = section.value("simulcast03") {
        // draft-03 form: `send rid=1,2;3 recv rid=4`
        let value = value.to_string();
        let tokens: Vec<&str> = value.split_whitespace().collect();
        for pair in tokens.chunks(2) {
            if let [dir, list] = pair {
                let list = list.strip_prefix("rid=").unwrap_or(list);
                simulcast.parse_list(DirectionWay::from(*dir), list);
            }
        }
    }

    if simulcast.is_empty() {
        None
    } else {
        Some(simulcast)
    }
}

fn parse_media(index: usize, section: &Section, kind: MediaKind) -> MediaInfo {
    let mid = section
        .value("mid")
        .map(|v| v.to_string())
        .unwrap_or_else(|| index.to_string());

    let mut media = MediaInfo::new(&mid, kind);
    if let Some(direction) = section.value("direction") {
        media.direction = Direction::from(direction.to_string().as_str());
    }

    for bandwidth in section.list("bandwidth") {
        if str_of(bandwidth, "type").as_deref() == Some(BANDWIDTH_AS) {
            media.bitrate = num_of(bandwidth, "limit").unwrap_or_default();
        }
    }

    for ext in section.list("ext") {
        if let (Some(id), Some(uri)) = (num_of::<u16>(ext, "value"), str_of(ext, "uri")) {
            media.add_extension(id, &uri);
        }
    }

    parse_codecs(&mut media, section);

    for record in section.list("rids") {
        let Some(id) = str_of(record, "id") else {
            continue;
        };
        let direction = str_of(record, "direction").unwrap_or_default();
        let mut rid = RidInfo::new(&id, DirectionWay::from(direction.as_str()));
        if let Some(params) = str_of(record, "params") {
            rid.parse_restrictions(&params);
        }
        media.add_rid(rid);
    }

    media.simulcast = parse_simulcast(section);

    media
}

/// Encodings announced by the send side simulcast list of `media`.
fn encodings_of(media: &MediaInfo) -> Vec<Vec<TrackEncodingInfo>> {
    let Some(simulcast) = &media.simulcast else {
        return vec![];
    };

    simulcast
        .send
        .iter()
        .map(|alternatives| {
            alternatives
                .iter()
                .map(|stream| {
                    let mut encoding = TrackEncodingInfo::new(&stream.id, stream.paused);
                    if let Some(rid) = media.rids.get(&stream.id) {
                        for pt in &rid.formats {
                            if let Some(codec) = media.codecs.get(pt) {
                                encoding.codecs.insert(*pt, codec.clone());
                            }
                        }
                        encoding.params = rid.params.clone();
                    }
                    encoding
                })
                .collect()
        })
        .collect()
}

impl SessionInfo {
    fn ensure_track(&mut self, stream_id: &str, track_id: &str, kind: MediaKind) -> &mut TrackInfo {
        let stream = self
            .streams
            .entry(stream_id.to_owned())
            .or_insert_with(|| StreamInfo::new(stream_id));
        stream
            .tracks
            .entry(track_id.to_owned())
            .or_insert_with(|| TrackInfo::new(track_id, kind))
    }

    /// Folds the `a=ssrc`, `a=msid` and `a=ssrc-group` lines of one media
    /// section into streams and tracks, returning the `(stream, track)` ids
    /// touched.
    fn fold_sources(&mut self, media: &MediaInfo, section: &Section) -> Vec<(String, String)> {
        let mut touched: Vec<(String, String)> = vec![];
        let mut touch = |ids: (String, String)| {
            if !touched.contains(&ids) {
                touched.push(ids);
            }
        };

        let mut ssrcs: Vec<SSRC> = vec![];
        let mut cnames: Vec<(SSRC, String)> = vec![];
        let mut assigned: BTreeSet<SSRC> = BTreeSet::new();

        for record in section.list("ssrcs") {
            let Some(ssrc) = int_of(record, "id").map(|id| id as SSRC) else {
                continue;
            };
            if !ssrcs.contains(&ssrc) {
                ssrcs.push(ssrc);
            }

            let attribute = str_of(record, "attribute").unwrap_or_default();
            let value = str_of(record, "value").unwrap_or_default();
            match attribute.as_str() {
                SSRC_ATTR_CNAME => cnames.push((ssrc, value)),
                SSRC_ATTR_MSID => {
                    if let Some(ids) = split_msid(&value, &media.id) {
                        self.ensure_track(&ids.0, &ids.1, media.kind).add_ssrc(ssrc);
                        assigned.insert(ssrc);
                        touch(ids);
                    }
                }
                _ => {}
            }
        }

        if let Some(ids) = section
            .value("msid")
            .and_then(|v| split_msid(&v.to_string(), &media.id))
        {
            let track = self.ensure_track(&ids.0, &ids.1, media.kind);
            track.media_id = Some(media.id.clone());
            for ssrc in &ssrcs {
                if assigned.insert(*ssrc) {
                    track.add_ssrc(*ssrc);
                }
            }
            touch(ids);
        }

        for ssrc in &ssrcs {
            if assigned.contains(ssrc) {
                continue;
            }
            let stream_id = cnames
                .iter()
                .find(|(s, _)| s == ssrc)
                .map(|(_, cname)| cname.clone())
                .unwrap_or_else(|| media.id.clone());
            let track = self.ensure_track(&stream_id, &media.id, media.kind);
            track.media_id = Some(media.id.clone());
            track.add_ssrc(*ssrc);
            touch((stream_id, media.id.clone()));
        }

        for record in section.list("ssrcGroups") {
            let semantics = str_of(record, "semantics").unwrap_or_default();
            let group = SourceGroupInfo::new(
                &semantics,
                parse_ssrcs(&str_of(record, "ssrcs").unwrap_or_default()),
            );
            let Some(primary) = group.primary() else {
                continue;
            };
            let owner = touched.iter().find(|(stream_id, track_id)| {
                self.streams
                    .get(stream_id)
                    .and_then(|s| s.track(track_id))
                    .is_some_and(|t| t.has_ssrc(primary))
            });
            match owner.cloned() {
                Some((stream_id, track_id)) => {
                    if let Some(track) = self.track_mut(&stream_id, &track_id) {
                        track.add_source_group(group);
                    }
                }
                None => debug!("ssrc-group {semantics} without owning track"),
            }
        }

        touched
    }

    /// Parses session description text.
    ///
    /// Media sections other than audio and video are skipped. ICE and DTLS
    /// parameters of a media section take precedence over session level ones.
    pub fn parse(text: &str) -> Result<SessionInfo> {
        let raw = transform::parse(text)?;

        let origin = raw.session.get("origin").ok_or(Error::ErrSdpMissingOrigin)?;
        let mut session = SessionInfo {
            id: str_of(origin, "sessionId")
                .and_then(|id| id.parse().ok())
                .unwrap_or_default(),
            version: num_of(origin, "sessionVersion").unwrap_or_default(),
            ..Default::default()
        };

        let mut ice = ice_of(&raw.session);
        let mut dtls = dtls_of(&raw.session);
        let mut end_of_candidates = raw.session.has("endOfCandidates");

        for record in raw.session.list("candidates") {
            if let Some(candidate) = candidate_of(record) {
                session.add_candidate(candidate);
            }
        }

        for (index, section) in raw.media.iter().enumerate() {
            let Some(m) = section.get("media") else {
                continue;
            };
            let kind = MediaKind::from(str_of(m, "type").unwrap_or_default().as_str());
            if kind == MediaKind::Unspecified {
                debug!("skipping media section {index} of type {:?}", str_of(m, "type"));
                continue;
            }

            if let Some(media_ice) = ice_of(section) {
                ice = Some(media_ice);
            }
            if let Some(media_dtls) = dtls_of(section) {
                dtls = Some(media_dtls);
            }
            end_of_candidates |= section.has("endOfCandidates");
            for record in section.list("candidates") {
                if let Some(candidate) = candidate_of(record) {
                    session.add_candidate(candidate);
                }
            }

            let media = parse_media(index, section, kind);
            let encodings = encodings_of(&media);
            for (stream_id, track_id) in session.fold_sources(&media, section) {
                if let Some(track) = session.track_mut(&stream_id, &track_id) {
                    if track.encodings.is_empty() && track.media_id.as_deref() == Some(media.id.as_str()) {
                        track.encodings = encodings.clone();
                    }
                }
            }
            session.add_media(media);
        }

        session.ice = ice.map(|mut ice| {
            ice.lite = raw.session.has("icelite");
            ice.end_of_candidates = end_of_candidates;
            ice
        });
        session.dtls = dtls;

        Ok(session)
    }
}
