use std::collections::BTreeMap;

use log::{debug, warn};
use shared::error::Error;

use crate::capability::Capability;
use crate::codec::{CODEC_RTX, CodecInfo, MediaKind, PayloadType};
use crate::direction::Direction;
use crate::rid::RidInfo;
use crate::simulcast::SimulcastInfo;

/// Statically assigned audio payload types.
const STATIC_PAYLOAD_TYPES: &[(&str, PayloadType)] = &[("pcmu", 0), ("pcma", 8)];
/// First dynamic payload type.
const DYNAMIC_PAYLOAD_TYPE_MIN: PayloadType = 96;

/// One media section of a session.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// media id, used as the bundle `mid`
    pub id: String,
    pub kind: MediaKind,
    pub direction: Direction,
    pub extensions: BTreeMap<u16, String>,
    pub codecs: BTreeMap<PayloadType, CodecInfo>,
    pub rids: BTreeMap<String, RidInfo>,
    pub simulcast: Option<SimulcastInfo>,
    /// `b=AS` hint in kbps, 0 when unset
    pub bitrate: u32,
}

impl MediaInfo {
    pub fn new(id: &str, kind: MediaKind) -> Self {
        MediaInfo {
            id: id.to_owned(),
            kind,
            direction: Direction::Sendrecv,
            ..Default::default()
        }
    }

    /// Builds the local media section offered for a capability.
    ///
    /// PCMU and PCMA keep their static payload types, every other codec gets
    /// the next dynamic one, directly followed by its RTX payload type when
    /// the capability asks for retransmissions.
    pub fn from_capability(id: &str, kind: MediaKind, capability: &Capability) -> Self {
        let mut media = MediaInfo::new(id, kind);
        let mut next_pt = DYNAMIC_PAYLOAD_TYPE_MIN;

        for spec in &capability.codecs {
            let mut codec = CodecInfo::from_name(spec, 0);
            codec.payload_type = match STATIC_PAYLOAD_TYPES.iter().find(|(name, _)| codec.is(name)) {
                Some((_, pt)) => *pt,
                None => {
                    let pt = next_pt;
                    next_pt = next_pt.saturating_add(1);
                    pt
                }
            };
            if capability.rtx && !CodecInfo::is_redundancy(&codec.name) && codec.payload_type >= DYNAMIC_PAYLOAD_TYPE_MIN {
                codec.rtx = Some(next_pt);
                next_pt = next_pt.saturating_add(1);
            }
            for fb in &capability.rtcpfbs {
                codec.add_rtcp_fb(fb.clone());
            }
            media.add_codec(codec);
        }

        for (i, uri) in capability.extensions.iter().enumerate() {
            media.add_extension(i as u16 + 1, uri);
        }

        media
    }

    pub fn add_codec(&mut self, codec: CodecInfo) {
        self.codecs.insert(codec.payload_type, codec);
    }

    pub fn codec(&self, payload_type: PayloadType) -> Option<&CodecInfo> {
        self.codecs.get(&payload_type)
    }

    pub fn codec_by_name(&self, name: &str) -> Option<&CodecInfo> {
        self.codecs.values().find(|c| c.is(name))
    }

    pub fn has_codec(&self, name: &str) -> bool {
        self.codec_by_name(name).is_some()
    }

    pub fn add_extension(&mut self, id: u16, uri: &str) {
        self.extensions.insert(id, uri.to_owned());
    }

    pub fn add_rid(&mut self, rid: RidInfo) {
        self.rids.insert(rid.id.clone(), rid);
    }

    /// All payload types of the `m=` line, RTX ones right after their codec.
    pub fn payload_types(&self) -> Vec<PayloadType> {
        let mut pts = vec![];
        for codec in self.codecs.values() {
            pts.push(codec.payload_type);
            if let Some(rtx) = codec.rtx {
                pts.push(rtx);
            }
        }
        pts
    }

    /// Rejected copy of this media section: no codecs, nothing flows.
    pub fn rejected(&self) -> MediaInfo {
        MediaInfo {
            direction: Direction::Inactive,
            ..MediaInfo::new(&self.id, self.kind)
        }
    }

    /// Answers this remote media section with the local `capability`.
    ///
    /// Payload types are always the remote ones, the rest of each kept codec
    /// (rtx, feedback, parameters) comes from the capability. When no codec
    /// is in common the section is still answered, inactive and without codecs.
    pub fn answer(&self, capability: &Capability) -> MediaInfo {
        let mut answer = MediaInfo::new(&self.id, self.kind);
        answer.direction = self.direction.reverse();

        let supported = MediaInfo::from_capability(&self.id, self.kind, capability);

        for remote in self.codecs.values() {
            let Some(local) = supported.codecs.values().find(|c| c.is_compatible(remote)) else {
                debug!("media {}: dropping codec {} not in capability", self.id, remote.name);
                continue;
            };

            let mut codec = CodecInfo {
                name: remote.name.clone(),
                payload_type: remote.payload_type,
                rtx: if local.has_rtx() { remote.rtx } else { None },
                clock_rate: remote.clock_rate,
                channels: remote.channels,
                params: local.params.clone(),
                rtcp_fbs: local.rtcp_fbs.clone(),
            };
            for (key, value) in remote.identity_params() {
                if codec.param(key).is_none() {
                    codec.add_param(key, value);
                }
            }
            answer.add_codec(codec);
        }

        if answer.codecs.is_empty() {
            warn!("{}", Error::ErrIncompatibleCapability(self.id.clone()));
            answer.direction = Direction::Inactive;
        }

        for (id, uri) in &self.extensions {
            if capability.supports_extension(uri) {
                answer.add_extension(*id, uri);
            }
        }

        if capability.simulcast {
            if let Some(simulcast) = &self.simulcast {
                answer.simulcast = Some(simulcast.reverse());
                for rid in self.rids.values() {
                    answer.add_rid(rid.reverse());
                }
            }
        }

        answer
    }

    pub(crate) fn is_rtx_codec(name: &str) -> bool {
        name.eq_ignore_ascii_case(CODEC_RTX)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::RtcpFeedbackInfo;
    use crate::direction::DirectionWay;
    use crate::simulcast::SimulcastStreamInfo;

    fn video_capability(rtx: bool) -> Capability {
        Capability {
            codecs: vec!["vp8".to_owned(), "h264;packetization-mode=1".to_owned()],
            rtx,
            rtcpfbs: vec![
                RtcpFeedbackInfo::new("goog-remb", &[]),
                RtcpFeedbackInfo::new("nack", &["pli"]),
            ],
            extensions: vec!["urn:3gpp:video-orientation".to_owned()],
            simulcast: false,
        }
    }

    fn remote_video() -> MediaInfo {
        let mut media = MediaInfo::new("1", MediaKind::Video);
        media.direction = Direction::Sendonly;

        let mut vp8 = CodecInfo::new("VP8", 100);
        vp8.rtx = Some(101);
        media.add_codec(vp8);

        let mut h264 = CodecInfo::from_name("H264;packetization-mode=1;profile-level-id=42e01f", 102);
        h264.rtx = Some(103);
        media.add_codec(h264);

        media.add_codec(CodecInfo::from_name("H264;packetization-mode=0", 104));
        media.add_codec(CodecInfo::new("VP9", 98));

        media.add_extension(3, "urn:3gpp:video-orientation");
        media.add_extension(4, "urn:ietf:params:rtp-hdrext:toffset");
        media
    }

    #[test]
    fn test_from_capability_payload_types() {
        let capability = Capability {
            codecs: vec!["opus".to_owned(), "pcmu".to_owned(), "pcma".to_owned(), "red".to_owned()],
            rtx: true,
            ..Default::default()
        };
        let media = MediaInfo::from_capability("audio", MediaKind::Audio, &capability);

        let tests = vec![
            ("opus", 96, Some(97)),
            ("pcmu", 0, None),
            ("pcma", 8, None),
            ("red", 98, None),
        ];
        for (name, pt, rtx) in tests {
            let codec = media.codec_by_name(name).unwrap();
            assert_eq!(codec.payload_type, pt, "{name}");
            assert_eq!(codec.rtx, rtx, "{name}");
        }
        assert_eq!(media.payload_types(), vec![0, 8, 96, 97, 98]);
    }

    #[test]
    fn test_answer_keeps_remote_payload_types() {
        let remote = remote_video();
        let answer = remote.answer(&video_capability(true));

        assert_eq!(answer.id, "1");
        assert_eq!(answer.direction, Direction::Recvonly);
        assert_eq!(answer.codecs.len(), 2);

        let vp8 = answer.codec(100).unwrap();
        assert_eq!(vp8.rtx, Some(101));
        assert_eq!(vp8.rtcp_fbs.len(), 2);

        let h264 = answer.codec(102).unwrap();
        assert_eq!(h264.rtx, Some(103));
        assert_eq!(h264.param("packetization-mode"), Some("1"));
        assert_eq!(h264.param("profile-level-id"), Some("42e01f"));

        for codec in answer.codecs.values() {
            assert!(remote.codec(codec.payload_type).is_some());
        }
        assert!(answer.codec(98).is_none());
        assert!(answer.codec(104).is_none());

        assert_eq!(answer.extensions.len(), 1);
        assert_eq!(answer.extensions.get(&3).map(String::as_str), Some("urn:3gpp:video-orientation"));
    }

    #[test]
    fn test_answer_without_rtx_capability() {
        let answer = remote_video().answer(&video_capability(false));

        for codec in answer.codecs.values() {
            assert!(!codec.has_rtx());
            assert_eq!(codec.rtx, None);
        }
        assert_eq!(answer.payload_types(), vec![100, 102]);
    }

    #[test]
    fn test_answer_incompatible() {
        let capability = Capability {
            codecs: vec!["av1".to_owned()],
            ..Default::default()
        };
        let answer = remote_video().answer(&capability);

        assert!(answer.codecs.is_empty());
        assert_eq!(answer.direction, Direction::Inactive);
        assert_eq!(answer.id, "1");
    }

    #[test]
    fn test_answer_mirrors_simulcast() {
        let mut remote = remote_video();
        let mut simulcast = SimulcastInfo::new();
        simulcast.add_alternatives(DirectionWay::Send, vec![SimulcastStreamInfo::new("hi", false)]);
        simulcast.add_alternatives(DirectionWay::Send, vec![SimulcastStreamInfo::new("lo", true)]);
        remote.simulcast = Some(simulcast);
        remote.add_rid(RidInfo::new("hi", DirectionWay::Send));
        remote.add_rid(RidInfo::new("lo", DirectionWay::Send));

        let without = remote.answer(&video_capability(true));
        assert!(without.simulcast.is_none());
        assert!(without.rids.is_empty());

        let mut capability = video_capability(true);
        capability.simulcast = true;
        let answer = remote.answer(&capability);

        let simulcast = answer.simulcast.unwrap();
        assert!(simulcast.send.is_empty());
        assert_eq!(simulcast.recv.len(), 2);
        assert!(simulcast.recv[1][0].paused);
        assert_eq!(answer.rids["hi"].direction, DirectionWay::Recv);
        assert_eq!(answer.rids["lo"].direction, DirectionWay::Recv);
    }
}
