use mediaserver_sdp::{
    CandidateInfo, Capability, Direction, DtlsInfo, IceInfo, MediaKind, SessionInfo, Setup,
};

const BROWSER_OFFER: &str = "v=0\r\n\
o=- 20518 0 IN IP4 0.0.0.0\r\n\
s=-\r\n\
t=0 0\r\n\
a=fingerprint:sha-256 5C:4E:65:9C:0F:2A:6F:12:6A:95:77:83:19:2F:AE:39:33:45:9C:2E:75:52:60:2B:E7:42:5D:7A:2E:80:38:E1\r\n\
a=group:BUNDLE 0 1\r\n\
a=ice-options:trickle\r\n\
a=msid-semantic:WMS *\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 109 9 0 8 101\r\n\
c=IN IP4 0.0.0.0\r\n\
a=sendrecv\r\n\
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
a=fmtp:109 maxplaybackrate=48000;stereo=1;useinbandfec=1\r\n\
a=fmtp:101 0-15\r\n\
a=ice-pwd:a3b3c0d7e5d1c6b9a6f6e2c1d2e8f7a1\r\n\
a=ice-ufrag:9b2c7a10\r\n\
a=mid:0\r\n\
a=msid:{stream} {audio}\r\n\
a=rtcp-mux\r\n\
a=rtpmap:109 opus/48000/2\r\n\
a=rtpmap:9 G722/8000/1\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=rtpmap:8 PCMA/8000\r\n\
a=rtpmap:101 telephone-event/8000\r\n\
a=setup:actpass\r\n\
a=ssrc:3254321045 cname:{cname}\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 120 124 121 125 126 127 97 98\r\n\
c=IN IP4 0.0.0.0\r\n\
a=recvonly\r\n\
a=extmap:3 urn:ietf:params:rtp-hdrext:sdes:mid\r\n\
a=extmap:5 urn:ietf:params:rtp-hdrext:toffset\r\n\
a=fmtp:126 profile-level-id=42e01f;level-asymmetry-allowed=1;packetization-mode=1\r\n\
a=fmtp:97 profile-level-id=42e01f;level-asymmetry-allowed=1\r\n\
a=fmtp:120 max-fs=12288;max-fr=60\r\n\
a=fmtp:124 apt=120\r\n\
a=fmtp:121 max-fs=12288;max-fr=60\r\n\
a=fmtp:125 apt=121\r\n\
a=fmtp:127 apt=126\r\n\
a=fmtp:98 apt=97\r\n\
a=ice-pwd:a3b3c0d7e5d1c6b9a6f6e2c1d2e8f7a1\r\n\
a=ice-ufrag:9b2c7a10\r\n\
a=mid:1\r\n\
a=rtcp-fb:120 nack\r\n\
a=rtcp-fb:120 nack pli\r\n\
a=rtcp-fb:120 ccm fir\r\n\
a=rtcp-fb:126 nack\r\n\
a=rtcp-fb:126 nack pli\r\n\
a=rtcp-mux\r\n\
a=rtcp-rsize\r\n\
a=rtpmap:120 VP8/90000\r\n\
a=rtpmap:124 rtx/90000\r\n\
a=rtpmap:121 VP9/90000\r\n\
a=rtpmap:125 rtx/90000\r\n\
a=rtpmap:126 H264/90000\r\n\
a=rtpmap:127 rtx/90000\r\n\
a=rtpmap:97 H264/90000\r\n\
a=rtpmap:98 rtx/90000\r\n\
a=setup:actpass\r\n";

fn init_log() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init()
        .ok();
}

#[test]
fn test_answer_browser_offer() {
    init_log();

    let offer = SessionInfo::parse(BROWSER_OFFER).unwrap();
    assert_eq!(offer.dtls.as_ref().unwrap().setup, Setup::Actpass);
    assert_eq!(offer.ice.as_ref().unwrap().ufrag, "9b2c7a10");

    let capabilities = Capability::capabilities_from_json(
        r#"{
            "audio": {"codecs": ["opus"], "extensions": ["urn:ietf:params:rtp-hdrext:ssrc-audio-level"]},
            "video": {"codecs": ["h264;packetization-mode=1"], "rtx": true,
                      "rtcpfbs": [{"id": "nack"}, {"id": "nack", "params": ["pli"]}, {"id": "goog-remb"}],
                      "extensions": ["urn:ietf:params:rtp-hdrext:toffset"]}
        }"#,
    )
    .unwrap();

    let dtls = DtlsInfo::new(
        offer.dtls.as_ref().unwrap().setup.reverse(),
        "sha-256",
        "AB:CD:EF",
    );
    let candidate = CandidateInfo::new("1", 1, "UDP", 33554431, "192.168.1.10", 40000, "host");
    let answer = offer.answer(IceInfo::generate(true), dtls, vec![candidate], &capabilities);

    let text = answer.write();
    let parsed = SessionInfo::parse(&text).unwrap();
    assert_eq!(parsed, SessionInfo::parse(&parsed.write()).unwrap());

    assert!(parsed.ice.as_ref().unwrap().lite);
    assert_eq!(parsed.dtls.as_ref().unwrap().setup, Setup::Passive);

    let audio = parsed.first_media(MediaKind::Audio).unwrap();
    assert_eq!(audio.id, "0");
    assert_eq!(audio.direction, Direction::Sendrecv);
    assert_eq!(audio.codecs.keys().copied().collect::<Vec<_>>(), vec![109]);
    assert_eq!(audio.extensions.get(&1).map(String::as_str), Some("urn:ietf:params:rtp-hdrext:ssrc-audio-level"));

    let video = parsed.first_media(MediaKind::Video).unwrap();
    assert_eq!(video.direction, Direction::Sendonly);
    assert_eq!(video.codecs.keys().copied().collect::<Vec<_>>(), vec![126]);
    let h264 = video.codec(126).unwrap();
    assert_eq!(h264.rtx, Some(127));
    assert_eq!(h264.param("profile-level-id"), Some("42e01f"));
    assert_eq!(h264.rtcp_fbs.len(), 3);
    assert_eq!(video.extensions.keys().copied().collect::<Vec<_>>(), vec![5]);

    assert!(text.contains("m=video 9 UDP/TLS/RTP/SAVPF 126 127\r\n"));
    assert!(text.contains("a=fmtp:127 apt=126\r\n"));
    assert!(text.contains("a=candidate:1 1 UDP 33554431 192.168.1.10 40000 typ host\r\n"));
}
