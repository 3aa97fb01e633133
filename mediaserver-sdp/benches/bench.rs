use criterion::{Criterion, criterion_group, criterion_main};
use mediaserver_sdp::{SessionInfo, transform};

const CANONICAL_SDP: &str = "v=0\r\n\
o=- 4215775240449105457 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
a=msid-semantic: WMS *\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=ice-ufrag:Ap9a\r\n\
a=ice-pwd:3Q3PqPnLkEgeSvEZkS2B4wEk\r\n\
a=candidate:1467250027 1 udp 2122260223 192.168.0.196 46243 typ host generation 0\r\n\
a=fingerprint:sha-256 D2:FA:0E:C3:22:59:5E:14:95:69:92:3D:13:B4:84:24:2C:C2:A2:C0:3E:FD:34:8E:5E:EA:6F:AF:52:CE:E6:0F\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=msid:stream0 audio0\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=ssrc:1001 cname:stream0\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=ice-ufrag:Ap9a\r\n\
a=ice-pwd:3Q3PqPnLkEgeSvEZkS2B4wEk\r\n\
a=fingerprint:sha-256 D2:FA:0E:C3:22:59:5E:14:95:69:92:3D:13:B4:84:24:2C:C2:A2:C0:3E:FD:34:8E:5E:EA:6F:AF:52:CE:E6:0F\r\n\
a=setup:actpass\r\n\
a=mid:1\r\n\
a=msid:stream0 video0\r\n\
a=sendonly\r\n\
a=rtcp-mux\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtcp-fb:96 nack\r\n\
a=rtcp-fb:96 nack pli\r\n\
a=rtpmap:97 rtx/90000\r\n\
a=fmtp:97 apt=96\r\n\
a=ssrc-group:FID 2001 2002\r\n\
a=ssrc:2001 cname:stream0\r\n\
a=ssrc:2002 cname:stream0\r\n";

fn benchmark_transform(c: &mut Criterion) {
    let raw = transform::parse(CANONICAL_SDP).unwrap();

    c.bench_function("Transform Parse", |b| {
        b.iter(|| {
            let _ = transform::parse(CANONICAL_SDP).unwrap();
        })
    });

    c.bench_function("Transform Write", |b| {
        b.iter(|| {
            let _ = transform::write(&raw);
        })
    });
}

fn benchmark_session(c: &mut Criterion) {
    let session = SessionInfo::parse(CANONICAL_SDP).unwrap();
    let reparsed = SessionInfo::parse(&session.write()).unwrap();
    if session != reparsed {
        panic!("write or parse not correct: \nsession: {session:?} \nvs \nreparsed: {reparsed:?}");
    }

    c.bench_function("SessionInfo Parse", |b| {
        b.iter(|| {
            let _ = SessionInfo::parse(CANONICAL_SDP).unwrap();
        })
    });

    c.bench_function("SessionInfo Write", |b| {
        b.iter(|| {
            let _ = session.write();
        })
    });
}

criterion_group!(benches, benchmark_transform, benchmark_session);
criterion_main!(benches);
